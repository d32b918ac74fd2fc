pub mod transport;

pub use transport::{
    DEFAULT_BASE_URL, ReqwestTransport, build_client, build_client_with_base_url,
};
