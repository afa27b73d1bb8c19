//! Learning-phase rotation.
//!
//! The scheduler is a pure function of a calendar date: it maps the number
//! of days elapsed since a fixed start date onto a static rotation table of
//! reading phases, and the weekday onto a static podcast table. No clock is
//! read here; the binary resolves "today" once and passes it in, which keeps
//! every date deterministic under test.
//!
//! # Rotation
//!
//! The reading rotation has three phases (spans may be unequal; lookup is
//! ranged) and wraps modulo the cycle length, so the function is total over
//! all dates:
//!
//! | Phase | Source | Difficulty | Span |
//! |-------|--------|------------|------|
//! | 0 | 20minutos | B2 | 14 days |
//! | 1 | El País | B2 | 14 days |
//! | 2 | El País Opinión | C1 | 14 days |
//!
//! Difficulty never regresses within one cycle; dates before the start date
//! clamp to phase 0.

use crate::error::ScheduleError;
use crate::models::Difficulty;
use chrono::{Datelike, NaiveDate, Weekday};

/// First day of the rotation. Elapsed days are measured from here.
pub const START_DATE: (i32, u32, u32) = (2025, 7, 1);

/// One contiguous block of days sharing a difficulty and a reading source.
#[derive(Debug)]
pub struct ReadingPhase {
    /// Human-readable source name, also used as the workspace source tag.
    pub source: &'static str,
    /// Front page to index articles from.
    pub url: &'static str,
    /// Difficulty the phase targets.
    pub difficulty: Difficulty,
    /// How many days the phase lasts before the rotation advances.
    pub span_days: i64,
}

/// The reading rotation table. Spans may be unequal; lookup is ranged.
pub static READING_ROTATION: [ReadingPhase; 3] = [
    ReadingPhase {
        source: "20minutos",
        url: "https://www.20minutos.es/",
        difficulty: Difficulty::B2,
        span_days: 14,
    },
    ReadingPhase {
        source: "El País",
        url: "https://elpais.com/",
        difficulty: Difficulty::B2,
        span_days: 14,
    },
    ReadingPhase {
        source: "El País Opinión",
        url: "https://elpais.com/opinion/",
        difficulty: Difficulty::C1,
        span_days: 14,
    },
];

/// One podcast source with its feed and platform links.
#[derive(Debug)]
pub struct PodcastFeed {
    pub name: &'static str,
    pub rss: &'static str,
    /// Show page on Apple Podcasts, used when no episode link resolves.
    pub apple_base: &'static str,
    /// Where the show is produced: "Spain" or "Latin America".
    pub region: &'static str,
    /// The show's own website, kept as a last-resort listening link.
    pub backup_url: &'static str,
}

/// Podcast feed per weekday, Monday through Friday.
///
/// The trigger is weekday-only; a manual weekend invocation clamps to
/// Monday's feed.
pub static PODCAST_SCHEDULE: [PodcastFeed; 5] = [
    PodcastFeed {
        name: "Hoy Hablamos",
        rss: "https://feeds.feedburner.com/hoyhablamos",
        apple_base: "https://podcasts.apple.com/kr/podcast/hoy-hablamos-podcast-diario-para-aprender-español-learn/id1201483158",
        region: "Spain",
        backup_url: "https://www.hoyhablamos.com/",
    },
    PodcastFeed {
        name: "Radio Ambulante",
        rss: "https://feeds.npr.org/510311/podcast.xml",
        apple_base: "https://podcasts.apple.com/kr/podcast/radio-ambulante/id527614348",
        region: "Latin America",
        backup_url: "https://radioambulante.org/",
    },
    PodcastFeed {
        name: "Advanced Spanish",
        rss: "https://feeds.buzzsprout.com/1829091.rss",
        apple_base: "https://podcasts.apple.com/kr/podcast/advanced-spanish-podcast-español-avanzado/id1632291264",
        region: "Spain",
        backup_url: "https://www.spanishlanguagecoach.com/podcast/",
    },
    PodcastFeed {
        name: "Radio Ambulante",
        rss: "https://feeds.npr.org/510311/podcast.xml",
        apple_base: "https://podcasts.apple.com/kr/podcast/radio-ambulante/id527614348",
        region: "Latin America",
        backup_url: "https://radioambulante.org/",
    },
    PodcastFeed {
        name: "DELE Podcast",
        rss: "https://anchor.fm/s/f4f4a4f0/podcast/rss",
        apple_base: "https://podcasts.apple.com/us/podcast/examen-dele/id1705001626",
        region: "Spain",
        backup_url: "https://anchor.fm/examen-dele",
    },
];

/// The day's derived schedule: which phase applies and which sources to use.
#[derive(Debug)]
pub struct LearningPhase {
    /// Index into [`READING_ROTATION`].
    pub phase_index: usize,
    /// Difficulty the day targets (the phase's difficulty).
    pub difficulty: Difficulty,
    /// The reading source for the day.
    pub reading: &'static ReadingPhase,
    /// The podcast feed for the day.
    pub podcast: &'static PodcastFeed,
    /// English weekday name, stored on the workspace page.
    pub weekday_name: String,
    /// The date the phase was computed for.
    pub date: NaiveDate,
}

fn start_date() -> NaiveDate {
    let (y, m, d) = START_DATE;
    NaiveDate::from_ymd_opt(y, m, d).expect("start date constant is valid")
}

fn cycle_days() -> i64 {
    READING_ROTATION.iter().map(|p| p.span_days).sum()
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Podcast feed for a weekday; weekends clamp to Monday's feed.
pub fn podcast_for_weekday(weekday: Weekday) -> &'static PodcastFeed {
    let idx = weekday.num_days_from_monday() as usize;
    PODCAST_SCHEDULE.get(idx).unwrap_or(&PODCAST_SCHEDULE[0])
}

/// Compute the learning phase for a date.
///
/// Total over all valid dates: days before the start date clamp to
/// phase 0, and days beyond one full cycle wrap around modulo the cycle
/// length. Same date in, same phase out, every call.
pub fn phase_for_date(date: NaiveDate) -> LearningPhase {
    let elapsed = (date - start_date()).num_days().max(0);
    let mut day_in_cycle = elapsed.rem_euclid(cycle_days());

    let mut phase_index = 0;
    for (i, phase) in READING_ROTATION.iter().enumerate() {
        if day_in_cycle < phase.span_days {
            phase_index = i;
            break;
        }
        day_in_cycle -= phase.span_days;
    }

    build_phase(date, phase_index)
}

/// Compute the phase for a date with the rotation index forced.
///
/// Used by the `--phase` override; the index must name a real rotation
/// entry.
pub fn phase_with_index(date: NaiveDate, index: usize) -> Result<LearningPhase, ScheduleError> {
    if index >= READING_ROTATION.len() {
        return Err(ScheduleError::PhaseOutOfRange(index));
    }
    Ok(build_phase(date, index))
}

fn build_phase(date: NaiveDate, phase_index: usize) -> LearningPhase {
    let reading = &READING_ROTATION[phase_index];
    LearningPhase {
        phase_index,
        difficulty: reading.difficulty,
        reading,
        podcast: podcast_for_weekday(date.weekday()),
        weekday_name: weekday_name(date.weekday()).to_string(),
        date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(offset: i64) -> NaiveDate {
        start_date() + Duration::days(offset)
    }

    #[test]
    fn test_phase_is_deterministic() {
        let d = NaiveDate::from_ymd_opt(2025, 9, 18).unwrap();
        let a = phase_for_date(d);
        let b = phase_for_date(d);
        assert_eq!(a.phase_index, b.phase_index);
        assert_eq!(a.difficulty, b.difficulty);
        assert_eq!(a.reading.source, b.reading.source);
        assert_eq!(a.podcast.name, b.podcast.name);
    }

    #[test]
    fn test_start_date_is_phase_zero() {
        let phase = phase_for_date(start_date());
        assert_eq!(phase.phase_index, 0);
        assert_eq!(phase.reading.source, "20minutos");
        assert_eq!(phase.difficulty, Difficulty::B2);
    }

    #[test]
    fn test_phase_boundaries() {
        assert_eq!(phase_for_date(day(13)).phase_index, 0);
        assert_eq!(phase_for_date(day(14)).phase_index, 1);
        assert_eq!(phase_for_date(day(27)).phase_index, 1);
        assert_eq!(phase_for_date(day(28)).phase_index, 2);
        assert_eq!(phase_for_date(day(41)).phase_index, 2);
    }

    #[test]
    fn test_cycle_wraps_to_start() {
        let cycle = cycle_days();
        let wrapped = phase_for_date(day(cycle));
        assert_eq!(wrapped.phase_index, 0);
        assert_eq!(
            wrapped.reading.source,
            phase_for_date(start_date()).reading.source
        );
        // An arbitrary far-future date lands on the same position as its
        // offset modulo the cycle.
        let far = phase_for_date(day(cycle * 7 + 20));
        assert_eq!(far.phase_index, phase_for_date(day(20)).phase_index);
    }

    #[test]
    fn test_dates_before_start_clamp_to_phase_zero() {
        let before = start_date() - Duration::days(90);
        let phase = phase_for_date(before);
        assert_eq!(phase.phase_index, 0);
        assert_eq!(phase.reading.source, "20minutos");
    }

    #[test]
    fn test_difficulty_monotonic_within_cycle() {
        let mut last = Difficulty::A1;
        for offset in 0..cycle_days() {
            let phase = phase_for_date(day(offset));
            assert!(
                phase.difficulty >= last,
                "difficulty regressed at day {offset}"
            );
            last = phase.difficulty;
        }
    }

    #[test]
    fn test_final_phase_is_opinion_c1() {
        let phase = phase_for_date(day(30));
        assert_eq!(phase.reading.source, "El País Opinión");
        assert_eq!(phase.difficulty, Difficulty::C1);
        assert!(phase.reading.url.contains("/opinion"));
    }

    #[test]
    fn test_podcast_weekday_mapping() {
        // 2025-07-01 is a Tuesday.
        let tuesday = phase_for_date(start_date());
        assert_eq!(tuesday.weekday_name, "Tuesday");
        assert_eq!(tuesday.podcast.name, "Radio Ambulante");

        let monday = phase_for_date(day(6));
        assert_eq!(monday.weekday_name, "Monday");
        assert_eq!(monday.podcast.name, "Hoy Hablamos");

        let friday = phase_for_date(day(3));
        assert_eq!(friday.weekday_name, "Friday");
        assert_eq!(friday.podcast.name, "DELE Podcast");
    }

    #[test]
    fn test_weekend_clamps_to_monday_feed() {
        let saturday = phase_for_date(day(4));
        assert_eq!(saturday.weekday_name, "Saturday");
        assert_eq!(saturday.podcast.name, PODCAST_SCHEDULE[0].name);

        let sunday = phase_for_date(day(5));
        assert_eq!(sunday.weekday_name, "Sunday");
        assert_eq!(sunday.podcast.name, PODCAST_SCHEDULE[0].name);
    }

    #[test]
    fn test_phase_override_in_range() {
        let d = start_date();
        let forced = phase_with_index(d, 2).unwrap();
        assert_eq!(forced.phase_index, 2);
        assert_eq!(forced.difficulty, Difficulty::C1);
        // The podcast still follows the weekday, not the forced index.
        assert_eq!(forced.podcast.name, "Radio Ambulante");
    }

    #[test]
    fn test_phase_override_out_of_range() {
        let d = start_date();
        assert!(matches!(
            phase_with_index(d, 99),
            Err(ScheduleError::PhaseOutOfRange(99))
        ));
    }
}
