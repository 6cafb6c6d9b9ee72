mod common;

mod capacity;
mod matching;
