mod platform;
mod vault;
