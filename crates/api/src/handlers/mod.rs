pub mod corpus;
pub mod pathways;
