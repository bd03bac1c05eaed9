pub mod feature_table;
pub mod persistence;
pub mod results;

pub use feature_table::{read_feature_table, read_feature_table_with_config, TableReaderConfig};
pub use persistence::{load_pipeline, save_pipeline};
pub use results::{format_results, parse_results, read_results, write_results};
