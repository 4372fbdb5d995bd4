pub mod resolver;

pub use resolver::DecryptionResolver;
