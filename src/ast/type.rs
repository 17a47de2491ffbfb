use std::fmt;

/// Semantic type of an expression. Authoritative only once the type checker
/// has decorated the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Type {
    #[default]
    Int32,
    Int64,
    Unsigned32,
    Float32,
    /// Booleans are stored and computed as int32.
    Bool,
}

impl Type {
    /// Maps a built-in type keyword, `None` for anything that may be an alias.
    pub fn from_keyword(name: &str) -> Option<Type> {
        match name {
            "integer" | "int" => Some(Type::Int32),
            "longint" | "long" => Some(Type::Int64),
            "unsigned" => Some(Type::Unsigned32),
            "real" | "float" | "double" => Some(Type::Float32),
            "boolean" | "bool" => Some(Type::Bool),
            _ => None,
        }
    }

    /// Shared operand type of a binary operation: float32 > int64 > unsigned32 > int32.
    pub fn unify(lhs: Type, rhs: Type) -> Type {
        [Type::Float32, Type::Int64, Type::Unsigned32]
            .into_iter()
            .find(|r#type| lhs == *r#type || rhs == *r#type)
            .unwrap_or(Type::Int32)
    }

    pub fn is_float(self) -> bool {
        self == Type::Float32
    }

    pub fn is_wide(self) -> bool {
        self == Type::Int64
    }

    pub fn is_unsigned(self) -> bool {
        self == Type::Unsigned32
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int32 => "integer",
            Type::Int64 => "longint",
            Type::Unsigned32 => "unsigned",
            Type::Float32 => "float",
            Type::Bool => "boolean",
        };
        f.write_str(name)
    }
}
