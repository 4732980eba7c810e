//! A self-contained room-with-stairs environment.
//!
//! [`MockGridEnv`] simulates a single MiniHack-style room: the agent (`@`)
//! starts on a random floor tile and the episode ends when it steps onto the
//! down staircase (`>`). Every known observation channel is produced, so the
//! recorder and windower can be exercised end to end without an external
//! game process.
//!
//! The env name `raw` selects raw mode, which mimics a bare game process: no
//! reward, no end status, and no step limit of its own.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::actions::{ActionSet, COMPASS_KEYS, COMPASS_LONGER_KEYS, MORE_KEY};
use super::traits::{Environment, RenderMode, StepOutcome};
use crate::observation::{ObservationBundle, RawObservation};

/// Env name that selects raw mode.
pub const RAW_ENV_NAME: &str = "raw";

const MESSAGE_LEN: usize = 256;
const INV_SLOTS: usize = 55;
const INV_STR_LEN: usize = 80;
const DESC_LEN: usize = 32;
const BLSTATS_LEN: usize = 27;
const CROP: usize = 5;
const TILE: usize = 4;

const WELCOME: &str = "Hello Agent, welcome to NetHack!  You are a neutral male gnomish Wizard.";

/// (letter, description, object class, glyph)
const INVENTORY: &[(u8, &str, u8, i64)] = &[
    (b'a', "a blessed +1 quarterstaff (weapon in hands)", 2, 1970),
    (b'b', "an uncursed cloak of magic resistance (being worn)", 3, 2082),
    (b'f', "an uncursed wand of sleep (0:8)", 11, 2324),
];

#[derive(Debug, Clone)]
pub struct MockGridEnv {
    name: String,
    raw_mode: bool,
    /// Interior size of the room; the walls add one tile on every side.
    room_rows: usize,
    room_cols: usize,
    max_steps: usize,
    actions: ActionSet,
    rng: StdRng,
    agent: (usize, usize),
    stairs: (usize, usize),
    steps: usize,
    done: bool,
    message: String,
}

impl MockGridEnv {
    /// A 5x5 room. `seed` makes placements reproducible.
    pub fn new(name: &str, max_steps: usize, seed: Option<u64>) -> Self {
        Self::with_room(name, 5, 5, max_steps, seed)
    }

    pub fn with_room(
        name: &str,
        room_rows: usize,
        room_cols: usize,
        max_steps: usize,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let room_rows = room_rows.max(1);
        let room_cols = room_cols.max(2);
        Self {
            name: name.to_string(),
            raw_mode: name == RAW_ENV_NAME,
            room_rows,
            room_cols,
            max_steps,
            actions: ActionSet::navigation(),
            rng,
            agent: (1, 1),
            stairs: (1, 2),
            steps: 0,
            done: false,
            message: String::new(),
        }
    }

    /// Put the agent and stairs at fixed interior positions (1-based, wall
    /// inclusive coordinates). Used by tests that need a known path length.
    pub fn place(&mut self, agent: (usize, usize), stairs: (usize, usize)) {
        self.agent = agent;
        self.stairs = stairs;
    }

    fn map_rows(&self) -> usize {
        self.room_rows + 2
    }

    fn map_cols(&self) -> usize {
        self.room_cols + 2
    }

    fn is_floor(&self, r: isize, c: isize) -> bool {
        r >= 1 && c >= 1 && r <= self.room_rows as isize && c <= self.room_cols as isize
    }

    /// The glyph at a map coordinate; out-of-map coordinates are blank.
    fn cell(&self, r: isize, c: isize) -> u8 {
        let (rows, cols) = (self.map_rows() as isize, self.map_cols() as isize);
        if r < 0 || c < 0 || r >= rows || c >= cols {
            return b' ';
        }
        let pos = (r as usize, c as usize);
        if pos == self.agent {
            b'@'
        } else if pos == self.stairs {
            b'>'
        } else if r == 0 || r == rows - 1 {
            b'-'
        } else if c == 0 || c == cols - 1 {
            b'|'
        } else {
            b'.'
        }
    }

    fn random_floor(&mut self) -> (usize, usize) {
        (
            self.rng.gen_range(1..=self.room_rows),
            self.rng.gen_range(1..=self.room_cols),
        )
    }

    fn direction(key: u8) -> Option<((isize, isize), bool)> {
        const DELTAS: [(isize, isize); 8] = [
            (-1, 0),
            (0, 1),
            (1, 0),
            (0, -1),
            (-1, 1),
            (1, 1),
            (1, -1),
            (-1, -1),
        ];
        if let Some(i) = COMPASS_KEYS.iter().position(|k| *k == key) {
            return Some((DELTAS[i], false));
        }
        COMPASS_LONGER_KEYS
            .iter()
            .position(|k| *k == key)
            .map(|i| (DELTAS[i], true))
    }

    /// Move the agent, returning true if it moved at least once.
    fn walk(&mut self, (dr, dc): (isize, isize), repeat: bool) -> bool {
        let mut moved = false;
        loop {
            let (r, c) = (self.agent.0 as isize + dr, self.agent.1 as isize + dc);
            if !self.is_floor(r, c) {
                break;
            }
            self.agent = (r as usize, c as usize);
            moved = true;
            if !repeat || self.agent == self.stairs {
                break;
            }
        }
        moved
    }

    // -- observation assembly ----------------------------------------------

    fn window(&self, origin: (isize, isize), rows: usize, cols: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(rows * cols);
        for dr in 0..rows as isize {
            for dc in 0..cols as isize {
                out.push(self.cell(origin.0 + dr, origin.1 + dc));
            }
        }
        out
    }

    fn crop_origin(&self) -> (isize, isize) {
        let half = (CROP / 2) as isize;
        (self.agent.0 as isize - half, self.agent.1 as isize - half)
    }

    fn tty_rows(&self) -> Vec<String> {
        let cols = self.map_cols();
        let mut rows = Vec::with_capacity(self.map_rows() + 3);
        rows.push(fit(&self.message, cols));
        for r in 0..self.map_rows() {
            let row = self.window((r as isize, 0), 1, cols);
            rows.push(String::from_utf8_lossy(&row).into_owned());
        }
        rows.push(fit("Agent the Evoker St:10 Dx:14 Co:12", cols));
        rows.push(fit(&format!("Dlvl:1 $:0 HP:12(12) T:{}", self.steps + 1), cols));
        rows
    }

    fn blstats(&self) -> Vec<i64> {
        let mut stats = vec![0i64; BLSTATS_LEN];
        stats[0] = self.agent.1 as i64;
        stats[1] = self.agent.0 as i64;
        stats[2..9].copy_from_slice(&[10, 10, 14, 12, 18, 11, 8]);
        stats[10] = 12;
        stats[11] = 12;
        stats[12] = 1;
        stats[14] = 7;
        stats[15] = 7;
        stats[16] = 9;
        stats[18] = 1;
        stats[20] = self.steps as i64 + 1;
        stats[21] = 1;
        stats[23] = 0;
        stats[24] = 1;
        stats[26] = 0;
        stats
    }

    fn observation(&self) -> ObservationBundle {
        let (rows, cols) = (self.map_rows(), self.map_cols());
        let chars = self.window((0, 0), rows, cols);
        let chars_crop = self.window(self.crop_origin(), CROP, CROP);

        let tty = self.tty_rows();
        let tty_chars: Vec<u8> = tty.iter().flat_map(|r| r.bytes()).collect();
        let cursor = (self.agent.0 as isize + 1, self.agent.1 as isize);
        let tty_origin = (cursor.0 - (CROP / 2) as isize, cursor.1 - (CROP / 2) as isize);
        let tty_crop: Vec<u8> = (0..CROP as isize)
            .flat_map(|dr| (0..CROP as isize).map(move |dc| (tty_origin.0 + dr, tty_origin.1 + dc)))
            .map(|(r, c)| {
                if r < 0 || c < 0 || r as usize >= tty.len() || c as usize >= cols {
                    b' '
                } else {
                    tty[r as usize].as_bytes()[c as usize]
                }
            })
            .collect();

        let mut bundle = ObservationBundle::new();
        let grid = |shape: Vec<usize>, data: Vec<u8>| RawObservation::Bytes { shape, data };
        let ints = |shape: Vec<usize>, data: Vec<i64>| RawObservation::Ints { shape, data };

        bundle.insert("chars".into(), grid(vec![rows, cols], chars.clone()));
        bundle.insert("chars_crop".into(), grid(vec![CROP, CROP], chars_crop.clone()));
        bundle.insert("glyphs".into(), ints(vec![rows, cols], chars.iter().map(|c| glyph_id(*c)).collect()));
        bundle.insert(
            "glyphs_crop".into(),
            ints(vec![CROP, CROP], chars_crop.iter().map(|c| glyph_id(*c)).collect()),
        );
        bundle.insert("colors".into(), ints(vec![rows, cols], chars.iter().map(|c| color_id(*c)).collect()));
        bundle.insert(
            "colors_crop".into(),
            ints(vec![CROP, CROP], chars_crop.iter().map(|c| color_id(*c)).collect()),
        );
        bundle.insert("specials".into(), ints(vec![rows, cols], vec![0; rows * cols]));
        bundle.insert("specials_crop".into(), ints(vec![CROP, CROP], vec![0; CROP * CROP]));
        bundle.insert(
            "screen_descriptions".into(),
            grid(vec![rows, cols, DESC_LEN], descriptions(&chars)),
        );
        bundle.insert(
            "screen_descriptions_crop".into(),
            grid(vec![CROP, CROP, DESC_LEN], descriptions(&chars_crop)),
        );
        bundle.insert("tty_chars".into(), grid(vec![tty.len(), cols], tty_chars.clone()));
        bundle.insert("tty_chars_crop".into(), grid(vec![CROP, CROP], tty_crop.clone()));
        bundle.insert(
            "tty_colors".into(),
            ints(vec![tty.len(), cols], tty_chars.iter().map(|c| color_id(*c)).collect()),
        );
        bundle.insert(
            "tty_colors_crop".into(),
            ints(vec![CROP, CROP], tty_crop.iter().map(|c| color_id(*c)).collect()),
        );
        bundle.insert("tty_cursor".into(), ints(vec![2], vec![cursor.0 as i64, cursor.1 as i64]));
        bundle.insert("blstats".into(), ints(vec![BLSTATS_LEN], self.blstats()));
        bundle.insert("message".into(), RawObservation::text_buffer(&self.message, MESSAGE_LEN));

        let mut inv_glyphs = vec![5976i64; INV_SLOTS];
        let mut inv_letters = vec![0u8; INV_SLOTS];
        let mut inv_oclasses = vec![0u8; INV_SLOTS];
        let mut inv_strs: Vec<&str> = vec![""; INV_SLOTS];
        for (slot, (letter, text, class, glyph)) in INVENTORY.iter().enumerate() {
            inv_glyphs[slot] = *glyph;
            inv_letters[slot] = *letter;
            inv_oclasses[slot] = *class;
            inv_strs[slot] = *text;
        }
        bundle.insert("inv_glyphs".into(), ints(vec![INV_SLOTS], inv_glyphs));
        bundle.insert("inv_letters".into(), grid(vec![INV_SLOTS], inv_letters));
        bundle.insert("inv_oclasses".into(), grid(vec![INV_SLOTS], inv_oclasses));
        bundle.insert("inv_strs".into(), RawObservation::text_rows(&inv_strs, INV_STR_LEN));

        bundle.insert("pixel".into(), pixels(&chars, rows, cols));
        bundle.insert("pixel_crop".into(), pixels(&chars_crop, CROP, CROP));
        bundle
    }
}

impl Environment for MockGridEnv {
    async fn reset(&mut self) -> Result<ObservationBundle> {
        self.agent = self.random_floor();
        self.stairs = loop {
            let candidate = self.random_floor();
            if candidate != self.agent {
                break candidate;
            }
        };
        self.steps = 0;
        self.done = false;
        self.message = WELCOME.to_string();

        tracing::debug!(env = %self.name, agent = ?self.agent, stairs = ?self.stairs, "mock env reset");
        Ok(self.observation())
    }

    async fn step(&mut self, action: usize) -> Result<StepOutcome> {
        if self.done {
            bail!("cannot step in a terminated episode");
        }
        let Some(key) = self.actions.key(action) else {
            bail!("action index {action} is outside the action set");
        };

        self.steps += 1;
        self.message = match Self::direction(key) {
            Some((delta, repeat)) => {
                if self.walk(delta, repeat) {
                    String::new()
                } else {
                    "It's a wall.".to_string()
                }
            }
            None if key == MORE_KEY => String::new(),
            None => format!("Unknown command '{}'.", char::from(key)),
        };

        let reached = self.agent == self.stairs;
        let truncated = !self.raw_mode && self.steps >= self.max_steps;
        self.done = reached || truncated;
        if reached {
            self.message = "There is a staircase down here.".to_string();
        }

        let (reward, end_status) = if self.raw_mode {
            (None, None)
        } else {
            let status = if reached {
                "TASK_SUCCESSFUL"
            } else if truncated {
                "ABORTED"
            } else {
                "RUNNING"
            };
            (Some(if reached { 1.0 } else { 0.0 }), Some(status.to_string()))
        };

        Ok(StepOutcome {
            observation: self.observation(),
            reward,
            done: self.done,
            end_status,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &ActionSet {
        &self.actions
    }

    fn enforces_step_limit(&self) -> bool {
        !self.raw_mode
    }

    fn render(&self, mode: RenderMode) -> Option<String> {
        if self.raw_mode {
            return None;
        }
        let tty = self.tty_rows();
        let text = match mode {
            RenderMode::Human | RenderMode::Ansi => tty.join("\n"),
            RenderMode::Full => {
                let mut full = tty.join("\n");
                full.push_str("\nInventory:");
                for (letter, text, _, _) in INVENTORY {
                    full.push_str(&format!("\n  {} - {}", char::from(*letter), text));
                }
                full
            }
        };
        Some(text)
    }
}

fn fit(text: &str, width: usize) -> String {
    let mut out: String = text.chars().filter(char::is_ascii).take(width).collect();
    while out.len() < width {
        out.push(' ');
    }
    out
}

fn glyph_id(c: u8) -> i64 {
    match c {
        b'@' => 337,
        b'>' => 2383,
        b'-' => 2361,
        b'|' => 2360,
        b'.' => 2378,
        _ => 2359,
    }
}

fn color_id(c: u8) -> i64 {
    match c {
        b'@' => 15,
        b'>' | b'-' | b'|' | b'.' => 7,
        _ => 0,
    }
}

fn description(c: u8) -> &'static str {
    match c {
        b'@' => "human wizard called Agent",
        b'>' => "staircase down",
        b'-' | b'|' => "wall",
        b'.' => "floor of a room",
        _ => "",
    }
}

fn descriptions(chars: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(chars.len() * DESC_LEN);
    for c in chars {
        let text = description(*c).as_bytes();
        out.extend_from_slice(text);
        out.resize(out.len() + DESC_LEN - text.len(), 0);
    }
    out
}

fn rgb(c: u8) -> [u8; 3] {
    match c {
        b'@' => [255, 255, 255],
        b'>' => [230, 200, 40],
        b'-' | b'|' => [150, 110, 60],
        b'.' => [90, 90, 90],
        _ => [0, 0, 0],
    }
}

fn pixels(chars: &[u8], rows: usize, cols: usize) -> RawObservation {
    let (width, height) = (cols * TILE, rows * TILE);
    let mut data = Vec::with_capacity(width * height * 3);
    for py in 0..height {
        for px in 0..width {
            data.extend_from_slice(&rgb(chars[(py / TILE) * cols + px / TILE]));
        }
    }
    RawObservation::Pixels {
        width: width as u32,
        height: height as u32,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::known_channel_names;

    #[tokio::test]
    async fn reset_emits_every_known_channel() {
        let mut env = MockGridEnv::new("MiniHack-Room-Random-5x5-v0", 50, Some(7));
        let obs = env.reset().await.unwrap();
        for name in known_channel_names() {
            assert!(obs.contains_key(name), "missing channel {name}");
        }
    }

    #[tokio::test]
    async fn walking_onto_stairs_ends_episode_with_reward() {
        let mut env = MockGridEnv::new("MiniHack-Room-Random-5x5-v0", 50, Some(1));
        env.reset().await.unwrap();
        env.place((1, 1), (1, 3));

        let east = env.actions().lookup(b'l').unwrap();
        let first = env.step(east).await.unwrap();
        assert!(!first.done);
        assert_eq!(first.reward, Some(0.0));

        let second = env.step(east).await.unwrap();
        assert!(second.done);
        assert_eq!(second.reward, Some(1.0));
        assert_eq!(second.end_status.as_deref(), Some("TASK_SUCCESSFUL"));
        assert!(env.step(east).await.is_err());
    }

    #[tokio::test]
    async fn walls_block_movement() {
        let mut env = MockGridEnv::new("MiniHack-Room-Random-5x5-v0", 50, Some(1));
        env.reset().await.unwrap();
        env.place((1, 1), (5, 5));

        let north = env.actions().lookup(b'k').unwrap();
        let outcome = env.step(north).await.unwrap();
        assert!(!outcome.done);
        assert_eq!(env.agent, (1, 1));
        assert_eq!(env.message, "It's a wall.");
    }

    #[tokio::test]
    async fn native_step_limit_truncates() {
        let mut env = MockGridEnv::new("MiniHack-Room-Random-5x5-v0", 2, Some(3));
        env.reset().await.unwrap();
        env.place((1, 1), (5, 5));
        let more = env.actions().lookup(MORE_KEY).unwrap();

        assert!(!env.step(more).await.unwrap().done);
        let last = env.step(more).await.unwrap();
        assert!(last.done);
        assert_eq!(last.end_status.as_deref(), Some("ABORTED"));
    }

    #[tokio::test]
    async fn raw_mode_has_no_reward_or_limit() {
        let mut env = MockGridEnv::new(RAW_ENV_NAME, 1, Some(3));
        assert!(!env.enforces_step_limit());
        assert!(env.render(RenderMode::Human).is_none());
        env.reset().await.unwrap();
        env.place((1, 1), (5, 5));
        let more = env.actions().lookup(MORE_KEY).unwrap();
        for _ in 0..3 {
            let outcome = env.step(more).await.unwrap();
            assert!(!outcome.done);
            assert_eq!(outcome.reward, None);
            assert_eq!(outcome.end_status, None);
        }
    }

    #[tokio::test]
    async fn same_seed_same_layout() {
        let mut a = MockGridEnv::new("MiniHack-Room-Random-5x5-v0", 50, Some(11));
        let mut b = MockGridEnv::new("MiniHack-Room-Random-5x5-v0", 50, Some(11));
        assert_eq!(a.reset().await.unwrap(), b.reset().await.unwrap());
    }

    #[tokio::test]
    async fn crop_is_centred_on_agent() {
        let mut env = MockGridEnv::new("MiniHack-Room-Random-5x5-v0", 50, Some(2));
        env.reset().await.unwrap();
        env.place((3, 3), (1, 1));
        match &env.observation()["chars_crop"] {
            RawObservation::Bytes { shape, data } => {
                assert_eq!(shape, &vec![CROP, CROP]);
                assert_eq!(data[(CROP / 2) * CROP + CROP / 2], b'@');
            }
            other => panic!("unexpected crop value {other:?}"),
        }
    }
}
