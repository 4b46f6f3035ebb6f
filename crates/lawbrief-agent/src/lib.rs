pub mod groq;

pub use groq::GroqBackend;
