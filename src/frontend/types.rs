use std::fmt::{Display, Formatter};

macro_rules! primitives {
    ($(($name:literal $variant:ident)),+) => {
        impl Primitive {
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Primitive::$variant),)+
                    _ => None,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(Primitive::$variant => $name,)+
                }
            }
        }
    };
}

/// The fixed set of types a declaration or signature may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Float,
    String,
    Void,
}

primitives!(
    ("int" Int),
    ("float" Float),
    ("string" String),
    ("void" Void)
);

impl Display for Primitive {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("int", Some(Primitive::Int); "int")]
    #[test_case("float", Some(Primitive::Float); "float")]
    #[test_case("void", Some(Primitive::Void); "void")]
    #[test_case("vec3", None; "custom type")]
    fn test_from_name(name: &str, expected: Option<Primitive>) {
        assert_eq!(Primitive::from_name(name), expected);
    }
}
