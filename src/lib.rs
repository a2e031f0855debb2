// src/lib.rs

pub mod collector;
