use clap::Parser;
use log::{debug, error, info, warn};
use macroquad::prelude::{next_frame, screen_height, screen_width};
use macroquad::window::Conf;
use mirror_client::assets::AssetStore;
use mirror_client::config::ClientConfig;
use mirror_client::error::ClientError;
use mirror_client::game::{ClientGame, TickInfo};
use mirror_client::input::MacroquadInput;
use mirror_client::renderers::{CanvasRenderer, GpuRenderer};
use mirror_client::rendering::{Renderer, RendererKind};
use mirror_client::session::Session;
use mirror_client::time::SystemClock;
use mirror_client::transport::UdpTransport;
use mirror_shared::{CapabilityRegistry, DeviceCaps};
use std::path::PathBuf;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long)]
    server: Option<String>,

    /// JSON configuration file; flags given here override it
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Window width
    #[arg(short = 'w', long)]
    width: Option<u32>,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long)]
    height: Option<u32>,

    /// Never use the accelerated renderer
    #[arg(long)]
    force_canvas: bool,

    /// Upper bound of the frame delta, in seconds
    #[arg(long)]
    max_delta: Option<f32>,
}

impl Args {
    fn load_config(&self) -> Result<ClientConfig, ClientError> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(max_delta) = self.max_delta {
            config.max_delta = max_delta;
        }
        config.force_canvas |= self.force_canvas;
        config.validate()?;
        Ok(config)
    }
}

struct Client {
    game: ClientGame,
    session: Session,
}

fn probe_device() -> DeviceCaps {
    DeviceCaps {
        gpu: true,
        canvas: true,
        mobile: cfg!(any(target_os = "android", target_os = "ios")),
        pixel_ratio: macroquad::window::screen_dpi_scale(),
        width: screen_width() as u32,
        height: screen_height() as u32,
    }
}

fn start(runtime: &Runtime, config: &ClientConfig) -> Result<Client, ClientError> {
    let device = probe_device();

    let mut game = ClientGame::new(config.clone(), device.clone(), CapabilityRegistry::with_defaults());
    game.selector_mut()
        .register(RendererKind::Gpu, Box::new(|| Box::new(GpuRenderer::new()) as Box<dyn Renderer>));
    game.selector_mut()
        .register(RendererKind::Canvas, Box::new(|| Box::new(CanvasRenderer::new()) as Box<dyn Renderer>));
    game.set_input_source(Box::new(MacroquadInput::new()));
    game.add_tick_observer(Box::new(|info: &TickInfo| {
        if info.frame_count % 600 == 0 {
            debug!("frame {} at {} fps", info.frame_count, info.fps);
        }
    }));

    let transport = runtime.block_on(UdpTransport::connect(&config.server))?;
    let mut session = Session::new(device, Box::new(AssetStore::new()));
    session.connect(Box::new(transport));

    Ok(Client { game, session })
}

async fn frame_loop(config: ClientConfig, runtime: Runtime) {
    let _guard = runtime.enter();
    let clock = SystemClock::new();

    let mut client = match start(&runtime, &config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to start client: {}", e);
            return;
        }
    };

    loop {
        client
            .game
            .resize(screen_width() as u32, screen_height() as u32);

        if let Err(e) = client.session.poll(&mut client.game) {
            if e.requires_reload() {
                error!("{}", e);
                info!("Reloading client...");
                client.session.disconnect();
                client.game.shutdown();
                client = match start(&runtime, &config) {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to restart client: {}", e);
                        return;
                    }
                };
            } else if e.is_fatal() {
                error!("{}", e);
                break;
            } else {
                warn!("{}", e);
            }
        }

        client.game.tick(&clock);
        client.session.on_tick(&mut client.game);

        next_frame().await;
    }

    client.session.disconnect();
    client.game.shutdown();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = args.load_config()?;

    info!("Starting client...");
    info!("Connecting to: {}", config.server);

    // drives socket readiness while the frame loop owns the main thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    let window = Conf {
        window_title: "Mirror Client".to_string(),
        window_width: config.width as i32,
        window_height: config.height as i32,
        window_resizable: true,
        ..Default::default()
    };
    macroquad::Window::from_config(window, frame_loop(config, runtime));

    Ok(())
}
