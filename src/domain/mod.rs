pub mod aggregation;
pub mod allow_list;
pub mod enrichment;
pub mod hardware;
pub mod types;

#[cfg(test)]
pub mod testing;
