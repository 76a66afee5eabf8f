pub mod code_actions;
pub mod color;
pub mod completion;
pub mod diagnostics;
pub mod embedded;
pub mod folding_ranges;
pub mod hover;
pub mod inlay_hints;
pub mod links;
pub mod magic_words;
pub mod references;
pub mod signature_help;
pub mod symbols;

#[cfg(test)]
pub(crate) mod test_support;
