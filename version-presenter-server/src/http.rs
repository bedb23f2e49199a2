use std::net::SocketAddr;

use poem::listener::{BoxListener, Listener, OpensslTlsConfig, TcpListener};

use crate::config::TLSConfig;

/// Listener for the http interface, wrapped in tls when it is configured
pub fn create_binding(bind_address: SocketAddr, tls: Option<TLSConfig>) -> BoxListener {
    let listener = TcpListener::bind(bind_address);

    match tls {
        Some(tls) => {
            let tls_config = OpensslTlsConfig::new()
                .cert_from_data(tls.certificate_pem)
                .key_from_data(tls.key_pem);
            listener.openssl_tls(tls_config).boxed()
        },
        None => listener.boxed(),
    }
}
