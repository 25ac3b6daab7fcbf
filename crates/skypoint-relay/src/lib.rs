// SkyPoint relay: shares one realtime store between session clients.

pub mod ws_server;
