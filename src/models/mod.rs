pub mod pools;
pub mod routes;
pub mod tokens;
pub mod trade;
