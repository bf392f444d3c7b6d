use crate::handlers::{route, AppState};
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// Bind the API and return the bound address with the future that runs it.
/// Pass port 0 to let the OS choose.
pub fn bind(
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = Result<(), hyper::Error>>), hyper::Error> {
    let make_svc = make_service_fn(move |_conn: &AddrStream| {
        let state = state.clone();

        async move { Ok::<_, Infallible>(service_fn(move |req| route(req, state.clone()))) }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    let local_addr = server.local_addr();

    Ok((local_addr, server.with_graceful_shutdown(shutdown)))
}
