pub mod scalarscorevisitor;
pub mod visitor;
