pub(crate) mod blur_engine;
