mod lifecycle;
mod switching;
