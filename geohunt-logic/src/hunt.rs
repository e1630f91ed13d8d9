use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    fix::Fix,
    landmark::{Landmark, LandmarkSet, TaskDefinition, TaskHint},
    proximity::{distance_meters, is_in_range},
    tasks::TaskRegistry,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, specta::Type)]
/// What happened after the active landmark was resolved
pub enum HuntAdvance {
    /// The next landmark is active now and its hint was revealed, contains its task title
    HintUnlocked(String),
    /// That was the last landmark
    AllCompleted,
}

impl HuntAdvance {
    pub fn message(&self) -> String {
        match self {
            Self::HintUnlocked(title) => format!("Hint unlocked: {title}"),
            Self::AllCompleted => "All tasks completed.".to_string(),
        }
    }
}

/// Result of running the active landmark's task
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedTask {
    pub index: usize,
    pub title: String,
    /// The app's message, or "Opened: <title>" when it had none
    pub message: String,
    /// Set when the app reported success and the landmark was resolved right away
    pub advance: Option<HuntAdvance>,
}

/// Walks the player through the landmarks in order. Only the first unresolved landmark is
/// active, its task can only be opened while the player is within its radius and it can only
/// be resolved after being opened.
#[derive(Debug, Clone)]
pub struct Hunt {
    landmarks: LandmarkSet,
    counter: usize,
    completed: BTreeSet<usize>,
    revealed: BTreeSet<usize>,
    opened: Option<usize>,
}

impl Hunt {
    pub fn new(landmarks: LandmarkSet) -> Self {
        Self {
            landmarks,
            counter: 0,
            completed: BTreeSet::new(),
            revealed: BTreeSet::from([0]),
            opened: None,
        }
    }

    pub fn landmarks(&self) -> &LandmarkSet {
        &self.landmarks
    }

    pub fn active_index(&self) -> Option<usize> {
        (self.counter < self.landmarks.len()).then_some(self.counter)
    }

    pub fn active(&self) -> Option<&Landmark> {
        self.active_index().map(|i| &self.landmarks[i])
    }

    pub fn active_distance(&self, fix: &Fix) -> Option<f64> {
        self.active().map(|l| distance_meters(fix, l))
    }

    pub fn active_in_range(&self, fix: &Fix) -> bool {
        self.active().is_some_and(|l| is_in_range(fix, l))
    }

    /// The active task, if the player is close enough to attempt it
    pub fn available_task(&self, fix: &Fix) -> Option<&TaskDefinition> {
        self.active()
            .filter(|l| is_in_range(fix, l))
            .map(|l| &l.task)
    }

    /// Run the active task through `registry` if the player is in range. The landmark is
    /// resolved immediately when the app reports success, otherwise it stays open until
    /// [Hunt::resolve_current] is called.
    pub fn open_task(&mut self, fix: &Fix, registry: &TaskRegistry) -> Option<OpenedTask> {
        let index = self.active_index()?;
        let task = self.available_task(fix)?;
        let outcome = registry.run(&task.app, &task.payload);
        let title = task.title.clone();
        let message = outcome
            .message
            .unwrap_or_else(|| format!("Opened: {title}"));

        self.opened = Some(index);
        let advance = if outcome.success {
            self.resolve_current()
        } else {
            None
        };

        Some(OpenedTask {
            index,
            title,
            message,
            advance,
        })
    }

    /// Whether the active task has been opened and is waiting to be resolved
    pub fn is_open(&self) -> bool {
        self.opened.is_some() && self.opened == self.active_index()
    }

    /// Mark the active landmark as done and move on to the next one. Does nothing unless its
    /// task was opened first.
    pub fn resolve_current(&mut self) -> Option<HuntAdvance> {
        if !self.is_open() {
            return None;
        }
        let current = self.active_index()?;
        self.completed.insert(current);
        self.opened = None;

        let next = current + 1;
        self.counter = next;
        if next < self.landmarks.len() {
            self.revealed.insert(next);
            Some(HuntAdvance::HintUnlocked(
                self.landmarks[next].task.title.clone(),
            ))
        } else {
            Some(HuntAdvance::AllCompleted)
        }
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    pub fn is_revealed(&self, index: usize) -> bool {
        self.revealed.contains(&index)
    }

    /// Hints the player can look back at: revealed and already completed, in hunt order
    pub fn unlocked_hints(&self) -> impl Iterator<Item = (usize, &TaskHint)> {
        self.revealed
            .intersection(&self.completed)
            .map(|&i| (i, &self.landmarks[i].task.hint))
    }

    pub fn is_finished(&self) -> bool {
        self.active_index().is_none()
    }

    /// (completed, total)
    pub fn progress(&self) -> (usize, usize) {
        (self.completed.len(), self.landmarks.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::tasks::TaskOutcome;

    fn landmark(id: &str, lat: f64, radius: f64) -> Landmark {
        Landmark {
            id: id.to_string(),
            name: id.to_string(),
            latitude: lat,
            longitude: 0.0,
            radius_meters: radius,
            task: TaskDefinition {
                app: "showMessage".to_string(),
                payload: Value::String(format!("Welcome to {id}")),
                title: format!("{id} task"),
                hint: TaskHint::Text(format!("Find {id}")),
            },
        }
    }

    fn hunt() -> Hunt {
        let set = LandmarkSet::new(vec![
            landmark("a", 0.0, 20.0),
            landmark("b", 0.01, 20.0),
            landmark("c", 0.02, 20.0),
        ])
        .unwrap();
        Hunt::new(set)
    }

    fn at(lat: f64) -> Fix {
        Fix::new(lat, 0.0, 5.0, 0)
    }

    #[test]
    fn starts_on_first_landmark() {
        let hunt = hunt();
        assert_eq!(hunt.active().unwrap().id, "a");
        assert!(hunt.is_revealed(0));
        assert!(!hunt.is_revealed(1));
        assert_eq!(hunt.progress(), (0, 3));
        assert_eq!(hunt.unlocked_hints().count(), 0);
    }

    /// Opens and acknowledges the active task from right on top of it
    fn complete_active(hunt: &mut Hunt, registry: &TaskRegistry) -> Option<HuntAdvance> {
        let lat = hunt.active()?.latitude;
        hunt.open_task(&at(lat), registry)?;
        hunt.resolve_current()
    }

    #[test]
    fn task_only_opens_in_range() {
        let mut hunt = hunt();
        let registry = TaskRegistry::with_builtin_apps();
        assert!(hunt.available_task(&at(0.0001)).is_some());
        assert!(hunt.active_in_range(&at(0.0001)));

        assert!(hunt.available_task(&at(0.01)).is_none());
        assert_eq!(hunt.open_task(&at(0.01), &registry), None);
        assert!(!hunt.is_open());
        let d = hunt.active_distance(&at(0.01)).unwrap();
        assert!(d > 1000.0, "{d}");
    }

    #[test]
    fn resolve_before_open_is_refused() {
        let mut hunt = hunt();
        let registry = TaskRegistry::with_builtin_apps();

        assert_eq!(hunt.resolve_current(), None);
        assert_eq!(hunt.active_index(), Some(0));
        assert!(!hunt.is_completed(0));

        let opened = hunt.open_task(&at(0.0), &registry).unwrap();
        assert_eq!(opened.index, 0);
        assert_eq!(opened.message, "Welcome to a");
        assert_eq!(opened.advance, None);
        assert!(hunt.is_open());
        assert!(hunt.resolve_current().is_some());

        // Opening one landmark doesn't carry over to the next
        assert!(!hunt.is_open());
        assert_eq!(hunt.resolve_current(), None);
        assert_eq!(hunt.active_index(), Some(1));
    }

    #[test]
    fn successful_app_resolves_right_away() {
        let mut hunt = hunt();
        let mut registry = TaskRegistry::new();
        registry.register("showMessage", |_| TaskOutcome {
            success: true,
            message: None,
        });

        let opened = hunt.open_task(&at(0.0), &registry).unwrap();
        assert_eq!(opened.message, "Opened: a task");
        assert_eq!(
            opened.advance,
            Some(HuntAdvance::HintUnlocked("b task".to_string()))
        );
        assert!(hunt.is_completed(0));
        assert_eq!(hunt.active_index(), Some(1));
        assert!(!hunt.is_open());
    }

    #[test]
    fn resolving_advances_and_reveals() {
        let mut hunt = hunt();
        let registry = TaskRegistry::with_builtin_apps();

        let adv = complete_active(&mut hunt, &registry).unwrap();
        assert_eq!(adv, HuntAdvance::HintUnlocked("b task".to_string()));
        assert_eq!(adv.message(), "Hint unlocked: b task");
        assert_eq!(hunt.active().unwrap().id, "b");
        assert!(hunt.is_completed(0));
        assert!(hunt.is_revealed(1));

        // Next landmark's radius is what matters now
        assert!(!hunt.active_in_range(&at(0.0)));
        assert!(hunt.active_in_range(&at(0.01)));

        let hints = hunt.unlocked_hints().collect::<Vec<_>>();
        assert_eq!(hints, [(0, &TaskHint::Text("Find a".to_string()))]);
    }

    #[test]
    fn finishes_after_last() {
        let mut hunt = hunt();
        let registry = TaskRegistry::with_builtin_apps();
        complete_active(&mut hunt, &registry);
        complete_active(&mut hunt, &registry);
        assert_eq!(
            complete_active(&mut hunt, &registry),
            Some(HuntAdvance::AllCompleted)
        );

        assert!(hunt.is_finished());
        assert!(hunt.active().is_none());
        assert!(!hunt.active_in_range(&at(0.02)));
        assert_eq!(hunt.progress(), (3, 3));
        assert_eq!(hunt.resolve_current(), None);
        assert_eq!(hunt.unlocked_hints().map(|(i, _)| i).collect::<Vec<_>>(), [0, 1, 2]);
    }

    #[test]
    fn empty_hunt_is_finished() {
        let hunt = Hunt::new(LandmarkSet::default());
        assert!(hunt.is_finished());
        assert_eq!(hunt.progress(), (0, 0));
    }
}
