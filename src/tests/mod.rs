//! Test suite covering the full render-and-frame pipeline.
