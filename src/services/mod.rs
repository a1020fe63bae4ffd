pub mod console;
pub mod history;
pub mod renderer;
pub mod similarity;

pub use console::{Console, LineConsole, TerminalConsole};
pub use history::HistoryLog;
pub use renderer::{TextOnlyRenderer, ComparisonRenderer, ViuRenderer};
pub use similarity::{HashSimilarityProvider, JsonSimilarityProvider, SimilarityProvider};
