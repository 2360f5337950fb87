mod output;
mod run;

pub(crate) use run::{run_category, run_products};
