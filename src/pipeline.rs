use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::assets::{AssetProvider, fetch_assets};
use crate::audio::narration_duration;
use crate::compose::{Transcoder, compose, extract_thumbnail};
use crate::content::{ContentGenerator, ContentPackage};
use crate::error::{PipelineError, Result};
use crate::publish::{Privacy, Publication, PublishMetadata, Publisher};
use crate::subtitle::{TextDirection, build_cues, write_srt};
use crate::tts::NarrationSynthesizer;
use crate::utils::remove_stale;

/// Run stages in the only order they may occur. `Failed` is reachable from
/// every non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Initial,
    ContentGenerated,
    NarrationSynthesized,
    AssetsAcquired,
    Composed,
    ThumbnailReady,
    SubtitlesReady,
    Published,
    Failed,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        use Stage::*;
        match self {
            Initial => Some(ContentGenerated),
            ContentGenerated => Some(NarrationSynthesized),
            NarrationSynthesized => Some(AssetsAcquired),
            AssetsAcquired => Some(Composed),
            Composed => Some(ThumbnailReady),
            ThumbnailReady => Some(SubtitlesReady),
            SubtitlesReady => Some(Published),
            Published | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Published | Stage::Failed)
    }
}

/// Tracks the current stage and rejects anything but the next one in line.
#[derive(Debug, Clone)]
pub struct StageMachine {
    current: Stage,
    trace: Vec<Stage>,
    failure: Option<(Stage, String)>,
}

impl Default for StageMachine {
    fn default() -> Self {
        Self {
            current: Stage::Initial,
            trace: vec![Stage::Initial],
            failure: None,
        }
    }
}

impl StageMachine {
    pub fn current(&self) -> Stage {
        self.current
    }

    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    pub fn advance(&mut self, to: Stage) -> Result<()> {
        if self.current.next() != Some(to) {
            return Err(PipelineError::InvalidInput(format!(
                "illegal stage transition {:?} -> {:?}",
                self.current, to
            )));
        }
        info!("Stage {:?} -> {:?}", self.current, to);
        self.current = to;
        self.trace.push(to);
        Ok(())
    }

    /// Moves to `Failed`, remembering the last stage reached. No-op once
    /// terminal.
    pub fn fail(&mut self, reason: String) {
        if self.current.is_terminal() {
            return;
        }
        error!("Pipeline failed after {:?}: {}", self.current, reason);
        self.failure = Some((self.current, reason));
        self.current = Stage::Failed;
        self.trace.push(Stage::Failed);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifacts {
    pub video: PathBuf,
    pub thumbnail: PathBuf,
    pub audio: PathBuf,
    pub subtitles: PathBuf,
}

/// Terminal outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub artifacts: Option<Artifacts>,
    pub publication: Option<Publication>,
    pub failure_reason: Option<String>,
    /// Last stage completed before the failure.
    pub failed_after: Option<Stage>,
    pub used_placeholder_assets: bool,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub workdir: PathBuf,
    pub max_assets: usize,
    pub fallback_duration: f64,
    pub privacy: Privacy,
    pub category: String,
    pub text_direction: TextDirection,
}

pub struct Orchestrator {
    settings: PipelineSettings,
    generator: Box<dyn ContentGenerator>,
    narrator: Box<dyn NarrationSynthesizer>,
    assets: Box<dyn AssetProvider>,
    transcoder: Box<dyn Transcoder>,
    publisher: Box<dyn Publisher>,
}

#[derive(Default)]
struct RunState {
    used_placeholders: bool,
}

impl Orchestrator {
    pub fn new(
        settings: PipelineSettings,
        generator: Box<dyn ContentGenerator>,
        narrator: Box<dyn NarrationSynthesizer>,
        assets: Box<dyn AssetProvider>,
        transcoder: Box<dyn Transcoder>,
        publisher: Box<dyn Publisher>,
    ) -> Self {
        Self {
            settings,
            generator,
            narrator,
            assets,
            transcoder,
            publisher,
        }
    }

    /// Runs every stage once, in order, stopping at the first failure. The
    /// working directory is left in place either way.
    pub async fn run(&self) -> PipelineResult {
        let mut machine = StageMachine::default();
        let mut state = RunState::default();
        let outcome = self.drive(&mut machine, &mut state).await;
        match outcome {
            Ok((artifacts, publication)) => PipelineResult {
                success: true,
                artifacts: Some(artifacts),
                publication: Some(publication),
                failure_reason: None,
                failed_after: None,
                used_placeholder_assets: state.used_placeholders,
                stages: machine.trace().to_vec(),
            },
            Err(e) => {
                machine.fail(e.to_string());
                let failed_after = machine.failure.as_ref().map(|(stage, _)| *stage);
                PipelineResult {
                    success: false,
                    artifacts: None,
                    publication: None,
                    failure_reason: Some(e.to_string()),
                    failed_after,
                    used_placeholder_assets: state.used_placeholders,
                    stages: machine.trace().to_vec(),
                }
            }
        }
    }

    async fn drive(
        &self,
        machine: &mut StageMachine,
        state: &mut RunState,
    ) -> Result<(Artifacts, Publication)> {
        let workdir = &self.settings.workdir;
        std::fs::create_dir_all(workdir)?;
        info!("Working directory: {}", workdir.display());

        let content = self
            .generator
            .generate()
            .await
            .map_err(|e| PipelineError::Generation(format!("{:#}", e)))?;
        info!("Generated \"{}\" ({} key points)", content.title, content.key_points.len());
        machine.advance(Stage::ContentGenerated)?;

        let audio = self.narrator.output_path(workdir);
        remove_stale(&audio)?;
        self.narrator
            .synthesize(&content.script, &audio)
            .await
            .map_err(|e| PipelineError::Synthesis(format!("{:#}", e)))?;
        if !audio.exists() {
            return Err(PipelineError::Synthesis(format!(
                "narration file {} was not produced",
                audio.display()
            )));
        }
        let total = self.measure(&audio);
        machine.advance(Stage::NarrationSynthesized)?;

        let batch = fetch_assets(
            self.assets.as_ref(),
            &content.key_points,
            self.settings.max_assets,
            workdir,
        )
        .await?;
        state.used_placeholders = batch.is_fallback();
        let assets = batch.into_refs();
        info!(
            "Acquired {} assets{}",
            assets.len(),
            if state.used_placeholders { " (placeholders)" } else { "" }
        );
        machine.advance(Stage::AssetsAcquired)?;

        let video = workdir.join("video.mp4");
        compose(self.transcoder.as_ref(), &assets, &audio, total, &video)?;
        machine.advance(Stage::Composed)?;

        let thumbnail = workdir.join("thumbnail.jpg");
        extract_thumbnail(self.transcoder.as_ref(), &video, total, &thumbnail)?;
        machine.advance(Stage::ThumbnailReady)?;

        let subtitles = workdir.join("subtitles.srt");
        let cues = build_cues(&content.script, total)?;
        write_srt(&subtitles, &cues, self.settings.text_direction)?;
        info!("Wrote {} subtitle cues to {}", cues.len(), subtitles.display());
        machine.advance(Stage::SubtitlesReady)?;

        let metadata = self.metadata(&content);
        let publication = self
            .publisher
            .upload(&video, &thumbnail, &metadata)
            .await
            .map_err(|e| PipelineError::Publish(format!("{:#}", e)))?;
        info!("Published {} at {}", publication.id, publication.url);
        machine.advance(Stage::Published)?;

        Ok((
            Artifacts {
                video,
                thumbnail,
                audio,
                subtitles,
            },
            publication,
        ))
    }

    fn measure(&self, audio: &Path) -> f64 {
        match narration_duration(audio) {
            Ok(d) if d.is_finite() && d > 0.0 => {
                info!("Narration duration: {:.2} seconds", d);
                d
            }
            Ok(d) => {
                warn!(
                    "Narration reports {} seconds; using fallback of {}s",
                    d, self.settings.fallback_duration
                );
                self.settings.fallback_duration
            }
            Err(e) => {
                warn!(
                    "Could not measure narration ({:#}); using fallback of {}s",
                    e, self.settings.fallback_duration
                );
                self.settings.fallback_duration
            }
        }
    }

    fn metadata(&self, content: &ContentPackage) -> PublishMetadata {
        PublishMetadata {
            title: content.title.clone(),
            description: content.description.clone(),
            tags: content.tags.clone(),
            category: self.settings.category.clone(),
            privacy: self.settings.privacy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::{EmptyProvider, FailingProvider};
    use crate::audio::tests::write_silent_wav;
    use crate::compose::TranscodeOutput;
    use crate::compose::tests::FakeEngine;
    use crate::subtitle::read_srt;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGenerator {
        script: &'static str,
    }

    #[async_trait]
    impl ContentGenerator for FixedGenerator {
        async fn generate(&self) -> anyhow::Result<ContentPackage> {
            Ok(ContentPackage {
                title: "Three steps".into(),
                script: self.script.into(),
                key_points: vec!["sunrise".into(), "coffee".into(), "desk".into()],
                description: "How to start".into(),
                tags: vec!["morning".into()],
            })
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl ContentGenerator for BrokenGenerator {
        async fn generate(&self) -> anyhow::Result<ContentPackage> {
            anyhow::bail!("model returned malformed JSON")
        }
    }

    struct WavNarrator {
        seconds: f64,
    }

    #[async_trait]
    impl NarrationSynthesizer for WavNarrator {
        fn output_path(&self, dest_dir: &Path) -> PathBuf {
            dest_dir.join("narration.wav")
        }

        async fn synthesize(&self, _text: &str, out_path: &Path) -> anyhow::Result<()> {
            write_silent_wav(out_path, self.seconds);
            Ok(())
        }
    }

    /// Claims success without writing anything.
    struct SilentNarrator;

    #[async_trait]
    impl NarrationSynthesizer for SilentNarrator {
        fn output_path(&self, dest_dir: &Path) -> PathBuf {
            dest_dir.join("narration.wav")
        }

        async fn synthesize(&self, _text: &str, _out_path: &Path) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct RejectingNarrator;

    #[async_trait]
    impl NarrationSynthesizer for RejectingNarrator {
        fn output_path(&self, dest_dir: &Path) -> PathBuf {
            dest_dir.join("narration.mp3")
        }

        async fn synthesize(&self, _text: &str, _out_path: &Path) -> anyhow::Result<()> {
            anyhow::bail!("401 Unauthorized: invalid voice id")
        }
    }

    /// Counts uploads and optionally refuses them.
    struct CountingPublisher {
        uploads: Arc<AtomicUsize>,
        reject: bool,
    }

    #[async_trait]
    impl Publisher for CountingPublisher {
        async fn upload(
            &self,
            _video: &Path,
            _thumbnail: &Path,
            metadata: &PublishMetadata,
        ) -> anyhow::Result<Publication> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                anyhow::bail!("quota exceeded");
            }
            Ok(Publication {
                id: "abc123".into(),
                url: format!("https://youtube.com/shorts/abc123?t={}", metadata.title.len()),
            })
        }
    }

    /// Renders video fine but cannot grab a frame.
    #[derive(Default)]
    struct NoFrameEngine {
        inner: FakeEngine,
    }

    impl Transcoder for NoFrameEngine {
        fn run(&self, args: &[String]) -> anyhow::Result<TranscodeOutput> {
            if args.iter().any(|a| a == "-frames:v") {
                return Ok(TranscodeOutput {
                    success: false,
                    diagnostics: "Output file is empty, nothing was encoded".into(),
                });
            }
            self.inner.run(args)
        }
    }

    fn settings(dir: &Path) -> PipelineSettings {
        PipelineSettings {
            workdir: dir.join("run"),
            max_assets: 3,
            fallback_duration: 35.0,
            privacy: Privacy::Private,
            category: "22".into(),
            text_direction: TextDirection::Ltr,
        }
    }

    fn orchestrator(
        dir: &Path,
        generator: Box<dyn ContentGenerator>,
        assets: Box<dyn AssetProvider>,
        engine: FakeEngine,
        reject_upload: bool,
    ) -> (Orchestrator, Arc<AtomicUsize>) {
        orchestrator_with(
            dir,
            generator,
            Box::new(WavNarrator { seconds: 6.0 }),
            assets,
            Box::new(engine),
            reject_upload,
        )
    }

    fn orchestrator_with(
        dir: &Path,
        generator: Box<dyn ContentGenerator>,
        narrator: Box<dyn NarrationSynthesizer>,
        assets: Box<dyn AssetProvider>,
        engine: Box<dyn Transcoder>,
        reject_upload: bool,
    ) -> (Orchestrator, Arc<AtomicUsize>) {
        let uploads = Arc::new(AtomicUsize::new(0));
        let orch = Orchestrator::new(
            settings(dir),
            generator,
            narrator,
            assets,
            engine,
            Box::new(CountingPublisher {
                uploads: uploads.clone(),
                reject: reject_upload,
            }),
        );
        (orch, uploads)
    }

    #[test]
    fn stage_machine_is_linear() {
        let mut m = StageMachine::default();
        assert!(m.advance(Stage::NarrationSynthesized).is_err());
        m.advance(Stage::ContentGenerated).unwrap();
        assert!(m.advance(Stage::ContentGenerated).is_err());
        m.fail("boom".into());
        assert_eq!(m.current(), Stage::Failed);
        assert!(m.advance(Stage::NarrationSynthesized).is_err());
        assert_eq!(
            m.trace(),
            &[Stage::Initial, Stage::ContentGenerated, Stage::Failed]
        );
    }

    #[test]
    fn every_stage_leads_to_published() {
        let mut stage = Stage::Initial;
        let mut steps = 0;
        while let Some(next) = stage.next() {
            stage = next;
            steps += 1;
        }
        assert_eq!(stage, Stage::Published);
        assert_eq!(steps, 7);
    }

    #[tokio::test]
    async fn placeholder_assets_still_publish() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, uploads) = orchestrator(
            dir.path(),
            Box::new(FixedGenerator {
                script: "Do this. Then that! Finally this?",
            }),
            Box::new(EmptyProvider),
            FakeEngine::default(),
            false,
        );
        let result = orch.run().await;
        assert!(result.success, "{:?}", result.failure_reason);
        assert!(result.used_placeholder_assets);
        assert_eq!(uploads.load(Ordering::SeqCst), 1);
        assert_eq!(result.stages.last(), Some(&Stage::Published));

        let artifacts = result.artifacts.unwrap();
        assert!(artifacts.video.exists());
        assert!(artifacts.thumbnail.exists());
        assert!(artifacts.audio.exists());

        let cues = read_srt(&artifacts.subtitles).unwrap();
        assert_eq!(cues.len(), 3);
        assert_eq!(cues[2].end, 6.0);

        let run = dir.path().join("run");
        for i in 0..3 {
            assert!(run.join(format!("placeholder_{}.png", i)).exists());
        }
        let list = std::fs::read_to_string(run.join("display_list.txt")).unwrap();
        assert_eq!(list.matches("duration 2.000").count(), 3);
    }

    #[tokio::test]
    async fn generation_failure_stops_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::default();
        let (orch, uploads) = orchestrator(
            dir.path(),
            Box::new(BrokenGenerator),
            Box::new(FailingProvider),
            engine,
            false,
        );
        let result = orch.run().await;
        assert!(!result.success);
        assert!(result.artifacts.is_none());
        assert_eq!(result.failed_after, Some(Stage::Initial));
        assert!(result.failure_reason.unwrap().contains("malformed JSON"));
        assert_eq!(uploads.load(Ordering::SeqCst), 0);
        assert!(dir.path().join("run").is_dir());
    }

    #[tokio::test]
    async fn composition_failure_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine {
            fail_with: Some("Unknown encoder 'libx264'".into()),
            ..Default::default()
        };
        let (orch, uploads) = orchestrator(
            dir.path(),
            Box::new(FixedGenerator { script: "One. Two." }),
            Box::new(FailingProvider),
            engine,
            false,
        );
        let result = orch.run().await;
        assert!(!result.success);
        assert_eq!(result.failed_after, Some(Stage::AssetsAcquired));
        assert!(result.failure_reason.unwrap().contains("libx264"));
        assert_eq!(uploads.load(Ordering::SeqCst), 0);
        assert!(dir.path().join("run/narration.wav").exists());
    }

    #[tokio::test]
    async fn empty_script_fails_at_subtitles() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(
            dir.path(),
            Box::new(FixedGenerator { script: "?!..." }),
            Box::new(EmptyProvider),
            FakeEngine::default(),
            false,
        );
        let result = orch.run().await;
        assert!(!result.success);
        assert_eq!(result.failed_after, Some(Stage::ThumbnailReady));
        assert!(dir.path().join("run/video.mp4").exists());
    }

    #[tokio::test]
    async fn publish_failure_keeps_local_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, uploads) = orchestrator(
            dir.path(),
            Box::new(FixedGenerator { script: "One. Two." }),
            Box::new(EmptyProvider),
            FakeEngine::default(),
            true,
        );
        let result = orch.run().await;
        assert!(!result.success);
        assert_eq!(result.failed_after, Some(Stage::SubtitlesReady));
        assert!(result.failure_reason.unwrap().contains("quota exceeded"));
        assert_eq!(uploads.load(Ordering::SeqCst), 1);
        let run = dir.path().join("run");
        assert!(run.join("subtitles.srt").exists());
        assert!(run.join("thumbnail.jpg").exists());
    }

    #[tokio::test]
    async fn synthesis_failure_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, uploads) = orchestrator_with(
            dir.path(),
            Box::new(FixedGenerator { script: "One. Two." }),
            Box::new(RejectingNarrator),
            Box::new(EmptyProvider),
            Box::new(FakeEngine::default()),
            false,
        );
        let result = orch.run().await;
        assert!(!result.success);
        assert_eq!(result.failed_after, Some(Stage::ContentGenerated));
        assert!(result.failure_reason.unwrap().contains("invalid voice id"));
        assert_eq!(uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn leftover_narration_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run");
        std::fs::create_dir_all(&run).unwrap();
        write_silent_wav(&run.join("narration.wav"), 3.0);

        let (orch, uploads) = orchestrator_with(
            dir.path(),
            Box::new(FixedGenerator { script: "One. Two." }),
            Box::new(SilentNarrator),
            Box::new(EmptyProvider),
            Box::new(FakeEngine::default()),
            false,
        );
        let result = orch.run().await;
        assert!(!result.success);
        assert_eq!(result.failed_after, Some(Stage::ContentGenerated));
        assert!(result.failure_reason.unwrap().contains("was not produced"));
        assert_eq!(uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn thumbnail_failure_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, uploads) = orchestrator_with(
            dir.path(),
            Box::new(FixedGenerator { script: "One. Two." }),
            Box::new(WavNarrator { seconds: 4.0 }),
            Box::new(EmptyProvider),
            Box::new(NoFrameEngine::default()),
            false,
        );
        let result = orch.run().await;
        assert!(!result.success);
        assert_eq!(result.failed_after, Some(Stage::Composed));
        assert!(result.failure_reason.unwrap().contains("nothing was encoded"));
        assert_eq!(uploads.load(Ordering::SeqCst), 0);
        assert!(dir.path().join("run/video.mp4").exists());
        assert!(!dir.path().join("run/subtitles.srt").exists());
    }
}
