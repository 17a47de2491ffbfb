use rustc_hash::FxHashMap;

use crate::ast::name::Name;
use crate::ast::r#type::Type;

/// Globals and function signatures, visible from every function.
#[derive(Debug, Default)]
pub struct TopLevelScope {
    globals: FxHashMap<Name, Type>,
    return_types: FxHashMap<Name, Type>,
}

impl TopLevelScope {
    pub fn register_global(&mut self, name: Name, r#type: Type) -> Option<Type> {
        self.globals.insert(name, r#type)
    }

    pub fn register_function(&mut self, name: Name, return_type: Type) -> Option<Type> {
        self.return_types.insert(name, return_type)
    }

    pub fn return_type(&self, function: &Name) -> Option<Type> {
        self.return_types.get(function).copied()
    }

    pub fn globals(&self) -> &FxHashMap<Name, Type> {
        &self.globals
    }

    /// Starts a fresh, empty local table for `function`.
    pub fn to_function_scope(&self, function: Name, return_type: Type) -> FunctionScope<'_> {
        FunctionScope {
            top_level: self,
            function,
            return_type,
            locals: FxHashMap::default(),
            implicit: vec![],
        }
    }
}

/// Flat per-function table: parameters, locals of every nested block, and
/// names that were used without a declaration.
#[derive(Debug)]
pub struct FunctionScope<'top> {
    top_level: &'top TopLevelScope,
    function: Name,
    return_type: Type,
    locals: FxHashMap<Name, Type>,
    implicit: Vec<Name>,
}

impl<'top> FunctionScope<'top> {
    pub fn register_local(&mut self, name: Name, r#type: Type) -> Option<Type> {
        self.locals.insert(name, r#type)
    }

    /// Locals shadow globals.
    pub fn value_type(&self, name: &Name) -> Option<Type> {
        self.locals
            .get(name)
            .or_else(|| self.top_level.globals.get(name))
            .copied()
    }

    /// Undeclared names are tolerated as int32 locals.
    pub fn value_type_or_declare(&mut self, name: &Name) -> Type {
        self.value_type(name).unwrap_or_else(|| {
            self.locals.insert(name.clone(), Type::Int32);
            self.implicit.push(name.clone());
            Type::Int32
        })
    }

    /// Assigning to the function's own name sets its result.
    pub fn is_result_name(&self, name: &Name) -> bool {
        *name == self.function
    }

    pub fn return_type(&self) -> Type {
        self.return_type
    }

    pub fn call_type(&self, callee: &Name) -> Type {
        self.top_level.return_type(callee).unwrap_or(Type::Int32)
    }

    pub fn into_parts(self) -> (FxHashMap<Name, Type>, Vec<Name>) {
        (self.locals, self.implicit)
    }
}
