pub mod counter;

pub mod ids {
    use crate::PLUGIN_ID;

    pub const COUNTER: &str = const_format::concatcp!(PLUGIN_ID, ".counter");
}
