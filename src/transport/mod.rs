pub mod framed;
pub mod tcp;
pub mod traits;
pub mod websocket;

pub use framed::{FramedTransport, ReceiveError};
pub use tcp::{DnsResolver, TcpConnector};
pub use traits::{ChannelUpgrader, Resolver, TransportConnector, TransportStream};
pub use websocket::WsUpgrader;
