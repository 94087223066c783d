use actix_web::dev::{Service, ServerHandle};
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Result;
use std::sync::{mpsc, LazyLock, Mutex};
use std::thread;
use tokio::runtime::Runtime;
use uuid::Uuid;

use super::registry::{MapView, Registry};

struct AppState {
    registry: Registry,
}

async fn serve_map(id: web::Path<String>, data: web::Data<AppState>) -> HttpResponse {
    match Uuid::parse_str(&id)
        .ok()
        .and_then(|id| data.registry.get(&id))
    {
        Some(document) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(document.to_string()),
        None => HttpResponse::NotFound().finish(),
    }
}

/// Serves published map pages under `http://{host}:{port}/{random prefix}/maps/{id}`
/// from a background thread.
pub struct MapServer {
    host: String,
    port: u16,
    handle: Option<thread::JoinHandle<()>>,
    server_handle: Option<ServerHandle>,
    registry: Registry,
}

impl MapServer {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            handle: None,
            server_handle: None,
            registry: Registry::new(&format!("http://{}:{}", host, port)),
        }
    }

    pub fn register(&self, document: String) -> MapView {
        self.registry.register(document)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Bound port; the real one once started with port 0.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Starts the server and waits until it is bound.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let host = self.host.clone();
        let port = self.port;
        let registry = self.registry.clone();
        let random_prefix = Uuid::new_v4().to_string();
        let route = format!("/{}/maps/{{id}}", random_prefix);

        let (tx, rx) = mpsc::channel::<std::io::Result<(u16, ServerHandle)>>();

        let handle = thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            };
            runtime.block_on(async move {
                let app_state = web::Data::new(AppState { registry });
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(app_state.clone())
                        .wrap_fn(|req, srv| {
                            info!("Incoming request: {} {}", req.method(), req.uri());
                            srv.call(req)
                        })
                        .route(&route, web::get().to(serve_map))
                })
                .workers(1)
                .bind((host.as_str(), port));
                let server = match server {
                    Ok(server) => server,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };
                let port = server.addrs().first().map_or(port, |addr| addr.port());
                let server = server.run();
                let _ = tx.send(Ok((port, server.handle())));
                if let Err(e) = server.await {
                    error!("map server failed: {}", e);
                }
            });
        });

        let (port, server_handle) = match rx.recv() {
            Ok(result) => result?,
            Err(_) => bail!("map server thread exited before binding"),
        };
        self.port = port;
        self.registry
            .set_url_prefix(&format!("http://{}:{}/{}", self.host, port, random_prefix));
        info!("map server bound to {}:{}", self.host, port);
        self.handle = Some(handle);
        self.server_handle = Some(server_handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(server_handle) = self.server_handle.take() {
            pollster::block_on(server_handle.stop(false));
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("map server thread panicked");
            }
        }
    }
}

impl Drop for MapServer {
    fn drop(&mut self) {
        self.stop();
    }
}

static MAP_SERVER: LazyLock<Mutex<Option<MapServer>>> = LazyLock::new(|| Mutex::new(None));

/// Publishes `document` on the process wide map server, starting it on a
/// free local port the first time.
pub fn publish(document: String) -> Result<MapView> {
    let mut server = MAP_SERVER.lock().unwrap();
    if server.is_none() {
        let mut new_server = MapServer::new("127.0.0.1", 0);
        new_server.start()?;
        *server = Some(new_server);
    }
    match server.as_ref() {
        Some(server) => Ok(server.register(document)),
        None => bail!("map server is not running"),
    }
}
