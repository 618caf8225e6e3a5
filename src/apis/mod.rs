mod gemini;

pub use gemini::*;
