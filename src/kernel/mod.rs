pub(crate) mod weights;
