pub mod record;

pub use record::{clean_apn_taxid, DeedInfo, DeedRecord, ScrapedTable};
