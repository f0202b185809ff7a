pub mod builder;
pub mod generator;
pub mod scope;
pub mod syntax;
pub mod types;

pub use generator::Generator;
pub use scope::ScopeStack;
pub use types::Primitive;
