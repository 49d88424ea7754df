pub mod local_maximum;

pub use local_maximum::{Candidate, Candidates, LocalMaximumFinder};
