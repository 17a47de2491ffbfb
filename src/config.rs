/// Pipeline switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Run dead-code elimination and constant folding.
    pub optimize: bool,
    /// Let both optimizer passes descend into `if`/`while` bodies instead of
    /// only looking at a function's top-level statements.
    pub fold_nested_blocks: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            optimize: true,
            fold_nested_blocks: false,
        }
    }
}
