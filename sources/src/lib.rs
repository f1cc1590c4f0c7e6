pub mod cancel;
pub mod mock;
pub mod router;
pub mod source;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use mock::MockSource;
pub use router::{RouterError, SourceRouter};
pub use source::{GenealogySource, Region, SourceMetadata, Tier};
