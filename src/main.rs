//! Marble Run entry point
//!
//! The browser build is driven from JavaScript through `platform::web`.
//! Natively this runs a scene headless and logs the notes it plays.

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use anyhow::{Context, Result, bail};
    use glam::Vec2;

    use marble_run::audio::LogPlayer;
    use marble_run::camera::Camera;
    use marble_run::consts::SIM_DT;
    use marble_run::sim::{Scene, SceneEvent};
    use marble_run::{Editor, Settings};

    const USAGE: &str = "usage: marble-run <scene.json> [seconds] [settings.json]";
    const DEFAULT_SECONDS: f32 = 10.0;

    struct Args {
        scene: String,
        seconds: f32,
        settings: Option<String>,
    }

    fn parse_args() -> Result<Args> {
        let mut args = std::env::args().skip(1);
        let Some(scene) = args.next() else {
            bail!(USAGE);
        };
        let seconds = match args.next() {
            Some(s) => s
                .parse::<f32>()
                .with_context(|| format!("invalid duration {s:?}"))?,
            None => DEFAULT_SECONDS,
        };
        Ok(Args {
            scene,
            seconds,
            settings: args.next(),
        })
    }

    pub fn run() -> Result<()> {
        let args = parse_args()?;

        let settings = match &args.settings {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading settings {path}"))?;
                Settings::from_json(&text).with_context(|| format!("parsing settings {path}"))?
            }
            None => Settings::default(),
        };

        let text = std::fs::read_to_string(&args.scene)
            .with_context(|| format!("reading scene {}", args.scene))?;
        let mut editor = Editor::new(Scene::default(), Camera::new(Vec2::new(1280.0, 720.0)));
        editor.apply_settings(&settings);
        editor
            .import_json(&text)
            .with_context(|| format!("importing {}", args.scene))?;

        let scene = editor.scene();
        log::info!(
            "Loaded {:?}: {} bars, {} spawners, {} placeholders",
            scene.name,
            scene.bars().len(),
            scene.spawners().len(),
            scene.placeholders().len()
        );

        let scheduled = editor.run_sequence();
        log::info!("Scheduled {scheduled} spawns");

        let mut player = LogPlayer::default();
        let (mut notes, mut woken, mut broken) = (0, 0, 0);
        let frames = (args.seconds / SIM_DT).ceil() as u32;
        for _ in 0..frames {
            let events = editor.frame(SIM_DT);
            notes += editor.play(&mut player, &events);
            for event in &events {
                match event {
                    SceneEvent::PlaceholderActivated { .. } => woken += 1,
                    SceneEvent::BarBroken { .. } => broken += 1,
                    _ => {}
                }
            }
        }

        log::info!(
            "{:.1}s simulated: {notes} notes, {woken} placeholders woken, {broken} bars broken, {} balls in play",
            args.seconds,
            editor.scene().balls().len()
        );
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Marble Run (native) starting...");
    headless::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is platform::web::start
}
