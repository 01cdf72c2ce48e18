use streamdeck_lib::prelude::*;
use tracing::info;

use streamdeck_relay_counter::PLUGIN_ID;
use streamdeck_relay_counter::actions::counter::CounterAction;
use streamdeck_relay_counter::render;

fn main() -> anyhow::Result<()> {
    let _guard = init(PLUGIN_ID);
    info!("Starting V's Relay Counter Stream Deck plugin");
    render::load_font();

    let plugin = Plugin::new().add_action(ActionFactory::default_of::<CounterAction>());

    run_plugin(plugin)
}
