use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use hookwork_core::prelude::*;

struct CountdownConfig {
    start: u32,
    tick: Duration,
    pulse_period: Duration,
    frame: Duration,
    typed: &'static str,
    keystroke_every: u32,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            start: 5,
            tick: Duration::from_millis(400),
            pulse_period: Duration::from_millis(600),
            frame: Duration::from_millis(50),
            typed: "hello hooks",
            keystroke_every: 3,
        }
    }
}

/// What the screen shows for one frame.
#[derive(Clone, PartialEq)]
struct Screen {
    countdown: u32,
    pulse: f32,
    echo: String,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.countdown {
            0 => "Liftoff!".to_string(),
            n => n.to_string(),
        };
        let bar = "#".repeat((self.pulse * 20.0).round() as usize);
        write!(f, "[{label:>8}] |{bar:<20}| > {}", self.echo)
    }
}

struct HooksScreen {
    start: u32,
    ticker: Ticker,
    pulse: Repeater,
    text: Signal<String>,
}

impl Component for HooksScreen {
    type Output = Screen;

    fn name(&self) -> &str {
        "hooks-screen"
    }

    fn render(&self, hooks: &mut RenderPass<'_>) -> Result<Screen, HookError> {
        let (left, set_left) = hooks.use_state(|| self.start)?;

        // The ticker subscription lives only while there is something to count.
        let ticker = self.ticker.clone();
        hooks.use_effect(deps![left > 0], move || {
            (left > 0).then(|| {
                ticker.subscribe(Box::new(move |_: u64| {
                    set_left.update(|l| l.saturating_sub(1));
                }))
            })
        })?;

        hooks.use_effect(deps![left == 0], move || {
            if left == 0 {
                log::info!("countdown finished");
            }
        })?;

        let frame = hooks.use_subscription(self.pulse.clone(), AnimationFrame::default)?;
        let echo = hooks.use_subscription(self.text.clone(), String::new)?;

        Ok(Screen {
            countdown: left,
            pulse: frame.progress,
            echo,
        })
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = CountdownConfig::default();
    let clock: Rc<dyn Clock> = Rc::new(SystemClock);
    let ticker = Ticker::new(clock.clone(), config.tick);
    let pulse = Repeater::new(clock, config.pulse_period).reversing();
    let text = signal(String::new());

    let mut host = Host::mount(
        HooksScreen {
            start: config.start,
            ticker: ticker.clone(),
            pulse: pulse.clone(),
            text: text.clone(),
        },
        EngineConfig::default(),
    )?;

    let mut keystrokes = config.typed.chars();
    let mut typing = true;
    let mut last: Option<Screen> = None;
    for frame in 1u32.. {
        std::thread::sleep(config.frame);
        ticker.poll();
        pulse.poll();
        if typing && frame % config.keystroke_every == 0 {
            match keystrokes.next() {
                Some(c) => text.update(|t| t.push(c)),
                None => typing = false,
            }
        }
        host.settle()?;

        if let Some(screen) = host.output()
            && last.as_ref() != Some(screen)
        {
            log::info!("{screen}");
            last = Some(screen.clone());
        }

        if !typing && ticker.is_idle() {
            break;
        }
    }

    if let Some(screen) = host.unmount()? {
        log::info!("final frame: {screen}");
    }
    Ok(())
}
