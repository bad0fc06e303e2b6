use super::models::CardNetwork;

const ASSET_DIR: &str = "cards";

/// Path of the logo shown for a card network.
///
/// Every network ships as `<slug>.svg` except American Express, whose
/// artwork is the full brand name in PNG.
pub fn card_asset_path(network: CardNetwork) -> String {
    match network {
        CardNetwork::Amex => format!("{ASSET_DIR}/american-express.png"),
        other => format!("{ASSET_DIR}/{}.svg", other.slug()),
    }
}
