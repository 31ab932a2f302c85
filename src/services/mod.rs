pub mod loudoun_scraper;
pub mod pdf_analyzer;
pub mod pdf_processor;
pub mod results_writer;

pub use loudoun_scraper::LoudounScraper;
pub use pdf_analyzer::OpenAiAnalyzer;
pub use pdf_processor::PdfTextProcessor;
pub use results_writer::XlsxResultsWriter;
