use gridtrace::config::{PlayConfig, WindowConfig};
use gridtrace::env::mock::MockGridEnv;
use gridtrace::env::ActionSet;
use gridtrace::episode::{ActionChoice, ActionSource, EpisodeRunner, SampledActions};
use gridtrace::observation::is_image_channel;
use gridtrace::trajectory::{read_log, verify_turn_sequence, TrajectoryRecorder};
use gridtrace::window::export_templates;

const BASE_KEYS: [&str; 6] = ["env_name", "instruction", "t", "goal", "action", "episode"];

/// Samples uniformly from a subset of the environment's keys.
struct SampledSubset {
    inner: SampledActions,
    keys: ActionSet,
}

impl ActionSource for SampledSubset {
    fn next_action(&mut self, actions: &ActionSet) -> anyhow::Result<ActionChoice> {
        match self.inner.next_action(&self.keys)? {
            ActionChoice::Act(i) => {
                let key = self.keys.key(i).unwrap();
                Ok(ActionChoice::Act(actions.lookup(key)?))
            }
            ActionChoice::Interrupt => Ok(ActionChoice::Interrupt),
        }
    }
}

#[tokio::test]
async fn three_step_sampled_episode_records_only_requested_channels() {
    let dir = tempfile::tempdir().unwrap();
    let config = PlayConfig {
        env: "raw".into(),
        ngames: 1,
        max_steps: 3,
        seed: Some(11),
        render: false,
        channels: vec!["message".into(), "blstats".into()],
        ..PlayConfig::default()
    };
    let recorder = TrajectoryRecorder::new(
        dir.path(),
        &config.env,
        &config.instruction,
        &config.goal,
        config.channels.clone(),
    );
    // In a one-row room, waiting and moving north or south never reach the
    // stairs, so the loop's own step limit ends the episode.
    let mut env = MockGridEnv::with_room("raw", 1, 20, 3, Some(11));
    let mut actions = SampledSubset {
        inner: SampledActions::new(Some(11)),
        keys: ActionSet::new(b"\rkj".to_vec()),
    };

    let summary = EpisodeRunner::new(config)
        .run(&mut env, &mut actions, &recorder)
        .await
        .unwrap();

    let text = std::fs::read_to_string(recorder.log_path()).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    // The reset state and the states before the second and third actions.
    assert_eq!(lines.len(), 3);
    assert_eq!(summary.records_written, 3);
    assert_eq!(summary.total_steps, 3);

    for line in &lines {
        let obj = line.as_object().unwrap();
        assert!(obj.contains_key("message"));
        assert!(obj.contains_key("blstats"));
        for key in obj.keys() {
            assert!(!is_image_channel(key), "image channel {key} recorded");
            assert!(
                BASE_KEYS.contains(&key.as_str()) || key == "message" || key == "blstats",
                "unexpected key {key}"
            );
        }
        assert_eq!(obj["blstats"].as_array().unwrap().len(), 27);
    }

    let records = read_log(recorder.log_path()).unwrap();
    verify_turn_sequence(records.iter().map(|r| r.t)).unwrap();
    assert_eq!(records[0].action, None);
    assert!(std::fs::read_dir(dir.path())
        .unwrap()
        .all(|e| e.unwrap().file_name() == "data.jsonl"));
}

#[tokio::test]
async fn recorded_log_round_trips_through_template_export() {
    let dir = tempfile::tempdir().unwrap();
    let config = PlayConfig {
        env: "raw".into(),
        ngames: 2,
        max_steps: 4,
        seed: Some(5),
        render: false,
        channels: vec![
            "chars_crop".into(),
            "blstats".into(),
            "inv_strs".into(),
            "message".into(),
            "pixel_crop".into(),
        ],
        ..PlayConfig::default()
    };
    let recorder = TrajectoryRecorder::new(
        dir.path(),
        &config.env,
        &config.instruction,
        &config.goal,
        config.channels.clone(),
    );
    let mut env = MockGridEnv::with_room("raw", 1, 30, 4, Some(5));
    let mut actions = SampledActions::new(Some(5));

    let summary = EpisodeRunner::new(config)
        .run(&mut env, &mut actions, &recorder)
        .await
        .unwrap();
    assert_eq!(summary.episodes, 2);

    let records = read_log(recorder.log_path()).unwrap();
    for record in &records {
        let image = record.channels["pixel_crop"].as_str().unwrap();
        assert_eq!(image, format!("pixel_crop_path{}.jpg", record.t));
        assert!(dir.path().join(image).is_file());
    }

    let output = dir.path().join("output.jsonl");
    let written = export_templates(&recorder.log_path(), &output, &WindowConfig::default()).unwrap();
    assert_eq!(written, records.len());

    let first: String = serde_json::from_str(
        std::fs::read_to_string(&output).unwrap().lines().next().unwrap(),
    )
    .unwrap();
    assert!(first.starts_with("\n# INSTRUCTION:\nSystem Message: Hello Agent, welcome to NetHack!"));
    assert!(first.contains("## STATE AT T: 0\n"));
    assert!(first.contains("Chars Crop:\n"));
    assert!(first.contains("Action: None\n"));
}
