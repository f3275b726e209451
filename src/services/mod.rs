pub(crate) mod answers;
pub(crate) mod grading;
pub(crate) mod materialize;
pub(crate) mod shuffle;
