use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{session_or_die, Session};
use crate::capability::CapabilityClass;
use crate::config::Config;
use crate::invoke::{invoke_once, Classify, RateGate};
use crate::prompt::ImagePrompt;
use crate::providers::{self, GeneratedImage, GenerationProvider};
use crate::{die, note, GenerateCommand, GenerateImageArgs, GenerateTextArgs};

async fn pick_model(
    session: &Session,
    capability: CapabilityClass,
    model: &Option<String>,
) -> String {
    match model {
        Some(model) => model.clone(),
        None => session.resolver.resolve(capability, false).await,
    }
}

/// Waits until the gate lets the next call through.
async fn pass_gate(gate: &RateGate) {
    while let Err(remaining) = gate.check() {
        note!(
            "waiting {}s before the next generation",
            remaining.as_secs_f64().ceil() as u64
        );

        tokio::time::sleep(remaining).await;
    }
}

/// One model and one rate gate shared by every prompt of a command.
struct Generation<'a> {
    provider: &'a dyn GenerationProvider,
    model: String,
    gate: RateGate,
}

impl Generation<'_> {
    async fn images(&self, prompt: &str, count: u32) -> Result<Vec<GeneratedImage>, providers::Error> {
        pass_gate(&self.gate).await;

        invoke_once(|| self.provider.generate_images(&self.model, prompt, count)).await
    }

    async fn text(&self, prompt: &str) -> Result<String, providers::Error> {
        pass_gate(&self.gate).await;

        invoke_once(|| self.provider.generate_text(&self.model, prompt)).await
    }
}

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("generation failed: {0}")]
    Generation(#[source] providers::Error),

    #[error("failed to write {}: {}", .0.display(), .1)]
    Write(PathBuf, #[source] std::io::Error),
}

fn die_on_failure(err: Error) -> ! {
    match &err {
        Error::Generation(source) => die!(
            "{}\n       {}",
            err,
            source.failure_class().remediation()
        ),
        Error::Write(..) => die!("{}", err),
    }
}

fn extension(image: &GeneratedImage) -> &'static str {
    match image.mime_type.as_deref() {
        Some("image/jpeg") => "jpg",
        Some("image/webp") => "webp",
        _ => "png",
    }
}

fn image_path(
    dir: &Path,
    stamp: u64,
    prompt_index: usize,
    image_index: usize,
    image: &GeneratedImage,
) -> PathBuf {
    dir.join(format!(
        "modelscout-{}-{}-{}.{}",
        stamp,
        prompt_index + 1,
        image_index + 1,
        extension(image)
    ))
}

fn image_prompts(args: &GenerateImageArgs) -> Vec<String> {
    if args.raw {
        return args.prompt.clone();
    }

    args.prompt
        .iter()
        .map(|subject| {
            ImagePrompt {
                subject,
                template: args.template,
                style: args.style,
                palette: &args.palette,
                text: args.text.as_deref(),
            }
            .compose()
        })
        .collect()
}

/// Generates `count` images per prompt and writes them under `dir`, stopping
/// at the first failure. Returns the written paths.
async fn write_images(
    generation: &Generation<'_>,
    prompts: &[String],
    count: u32,
    dir: &Path,
    stamp: u64,
) -> Result<Vec<PathBuf>, Error> {
    let mut written = Vec::new();

    for (prompt_index, prompt) in prompts.iter().enumerate() {
        tracing::debug!(model = %generation.model, prompt = %prompt, "generating images");

        let images = generation
            .images(prompt, count)
            .await
            .map_err(Error::Generation)?;

        for (image_index, image) in images.iter().enumerate() {
            let path = image_path(dir, stamp, prompt_index, image_index, image);

            tokio::fs::write(&path, &image.bytes)
                .await
                .map_err(|e| Error::Write(path.clone(), e))?;

            println!("{}", path.display());

            written.push(path);
        }
    }

    Ok(written)
}

/// Prints one completion per prompt, stopping at the first failure.
async fn print_texts(generation: &Generation<'_>, prompts: &[String]) -> Result<(), Error> {
    for prompt in prompts {
        let text = generation.text(prompt).await.map_err(Error::Generation)?;

        println!("{}", text.trim_end());
    }

    Ok(())
}

async fn generate_images(config: &Config, args: &GenerateImageArgs) {
    let session = session_or_die(config);

    let generation = Generation {
        provider: &*session.backend,
        model: pick_model(&session, CapabilityClass::Image, &args.model).await,
        gate: RateGate::new(config.min_generation_interval()),
    };

    tracing::info!(model = %generation.model, prompts = args.prompt.len(), "generating images");

    if let Err(err) = tokio::fs::create_dir_all(&args.out).await {
        die!("failed to create {}: {}", args.out.display(), err);
    }

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let prompts = image_prompts(args);

    if let Err(err) = write_images(&generation, &prompts, args.count, &args.out, stamp).await {
        die_on_failure(err);
    }
}

async fn generate_text(config: &Config, args: &GenerateTextArgs) {
    let session = session_or_die(config);

    let generation = Generation {
        provider: &*session.backend,
        model: pick_model(&session, CapabilityClass::Text, &args.model).await,
        gate: RateGate::new(config.min_generation_interval()),
    };

    if let Err(err) = print_texts(&generation, &args.prompt).await {
        die_on_failure(err);
    }
}

pub(crate) async fn generate_cmd(config: &Config, command: &GenerateCommand) {
    match command {
        GenerateCommand::Image(args) => generate_images(config, args).await,
        GenerateCommand::Text(args) => generate_text(config, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{Style, Template};
    use crate::providers::ErrorKind;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    const IMAGE_MODEL: &str = "imagen-4.0-generate-001";

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String)>>,
        fail_with: Option<ErrorKind>,
    }

    impl Recorder {
        fn record(&self, model: &str, prompt: &str) -> Result<(), providers::Error> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), prompt.to_string()));

            match self.fail_with {
                Some(kind) => Err(providers::Error::from_kind(kind)),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationProvider for Recorder {
        async fn generate_images(
            &self,
            model: &str,
            prompt: &str,
            count: u32,
        ) -> Result<Vec<GeneratedImage>, providers::Error> {
            self.record(model, prompt)?;

            Ok((0..count)
                .map(|_| GeneratedImage {
                    bytes: b"\x89PNG".to_vec(),
                    mime_type: Some("image/png".to_string()),
                })
                .collect())
        }

        async fn generate_text(&self, model: &str, prompt: &str) -> Result<String, providers::Error> {
            self.record(model, prompt)?;

            Ok(format!("re: {}\n", prompt))
        }
    }

    fn generation(provider: &Recorder, interval: Duration) -> Generation<'_> {
        Generation {
            provider,
            model: IMAGE_MODEL.to_string(),
            gate: RateGate::new(interval),
        }
    }

    fn prompts(prompts: &[&str]) -> Vec<String> {
        prompts.iter().map(|p| p.to_string()).collect()
    }

    fn image_args(raw: bool) -> GenerateImageArgs {
        GenerateImageArgs {
            prompt: prompts(&["coffee", "tea"]),
            count: 1,
            out: PathBuf::from("."),
            model: None,
            style: Some(Style::Minimalist),
            template: Template::Centered,
            palette: prompts(&["#ff0000"]),
            text: None,
            raw,
        }
    }

    #[tokio::test]
    async fn rate_limited_image_prompt_stops_the_run() {
        let provider = Recorder {
            fail_with: Some(ErrorKind::ExcessUsage),
            ..Default::default()
        };

        let dir = std::env::temp_dir();

        let result = write_images(
            &generation(&provider, Duration::ZERO),
            &prompts(&["coffee", "tea"]),
            2,
            &dir,
            0,
        )
        .await;

        match result {
            Err(Error::Generation(err)) => assert_eq!(err.kind(), ErrorKind::ExcessUsage),
            other => panic!("unexpected result: {:?}", other),
        }

        assert_eq!(provider.calls(), vec![(IMAGE_MODEL.to_string(), "coffee".to_string())]);
    }

    #[tokio::test]
    async fn failed_text_prompt_stops_the_run() {
        let provider = Recorder {
            fail_with: Some(ErrorKind::InternalError),
            ..Default::default()
        };

        let result = print_texts(
            &generation(&provider, Duration::ZERO),
            &prompts(&["one", "two", "three"]),
        )
        .await;

        assert!(matches!(result, Err(Error::Generation(_))));
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn every_prompt_uses_the_same_model() {
        let provider = Recorder::default();

        let dir = std::env::temp_dir().join(format!("modelscout-generate-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let written = write_images(
            &generation(&provider, Duration::ZERO),
            &prompts(&["coffee", "tea"]),
            2,
            &dir,
            9,
        )
        .await
        .unwrap();

        assert_eq!(written.len(), 4);
        assert_eq!(written[3], dir.join("modelscout-9-2-2.png"));
        assert_eq!(tokio::fs::read(&written[0]).await.unwrap(), b"\x89PNG");

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(model, _)| model == IMAGE_MODEL));
        assert_eq!(calls[1].1, "tea");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn prompts_wait_for_the_gate() {
        let provider = Recorder::default();
        let interval = Duration::from_millis(50);

        let start = Instant::now();

        print_texts(&generation(&provider, interval), &prompts(&["one", "two"]))
            .await
            .unwrap();

        assert!(start.elapsed() >= interval);
        assert_eq!(provider.calls().len(), 2);
    }

    #[test]
    fn image_prompts_are_composed_unless_raw() {
        let composed = image_prompts(&image_args(false));

        assert_eq!(composed.len(), 2);
        assert!(composed[0].starts_with("coffee, minimalist design"));
        assert!(composed[1].starts_with("tea, minimalist design"));
        assert!(composed[0].contains("leave outer 8% margin"));
        assert!(composed[0].contains("color palette: red"));

        assert_eq!(image_prompts(&image_args(true)), prompts(&["coffee", "tea"]));
    }

    #[test]
    fn image_files_are_named_by_prompt_and_index() {
        let png = GeneratedImage {
            bytes: Vec::new(),
            mime_type: Some("image/png".to_string()),
        };
        let jpeg = GeneratedImage {
            bytes: Vec::new(),
            mime_type: Some("image/jpeg".to_string()),
        };
        let unknown = GeneratedImage {
            bytes: Vec::new(),
            mime_type: None,
        };

        let dir = Path::new("out");

        assert_eq!(image_path(dir, 7, 0, 0, &png), Path::new("out/modelscout-7-1-1.png"));
        assert_eq!(image_path(dir, 7, 1, 2, &jpeg), Path::new("out/modelscout-7-2-3.jpg"));
        assert_eq!(extension(&unknown), "png");
    }
}
