//! Time-base normalization for message timestamps.

use crate::error::{ChatprepError, Result};
use crate::message::Message;

/// Delta that moves the mean timestamp of `messages` to (approximately) zero.
///
/// Computed as `floor(-(sum of times) / count)`.
pub fn centering_delta(messages: &[Message]) -> Result<i64> {
    if messages.is_empty() {
        return Err(ChatprepError::empty_corpus("normalize the time base of"));
    }
    let sum: i128 = messages.iter().map(|message| i128::from(message.time)).sum();
    let count = messages.len() as i128;
    i64::try_from((-sum).div_euclid(count))
        .map_err(|_| ChatprepError::Internal("time delta exceeds i64".into()))
}

/// Adds `delta` hours to every message.
///
/// Every shifted time is checked before any message is touched, so on
/// [`ChatprepError::TimeOverflow`] the messages are left as they were.
pub fn shift(messages: &mut [Message], delta: i64) -> Result<()> {
    if messages
        .iter()
        .any(|message| message.time.checked_add(delta).is_none())
    {
        return Err(ChatprepError::TimeOverflow { delta });
    }
    for message in messages.iter_mut() {
        message.time += delta;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Sender;

    fn messages(times: &[i64]) -> Vec<Message> {
        times
            .iter()
            .enumerate()
            .map(|(idx, &time)| Message {
                time,
                sender: Sender::Name("x".into()),
                content: String::new(),
                line_index: idx,
                chat_id: 0,
            })
            .collect()
    }

    #[test]
    fn delta_uses_floor_division() {
        assert_eq!(centering_delta(&messages(&[10, 11])).unwrap(), -11);
        assert_eq!(centering_delta(&messages(&[-10, -11])).unwrap(), 10);
        assert_eq!(
            centering_delta(&messages(&[400_000, 400_006, 400_009])).unwrap(),
            -400_005
        );
    }

    #[test]
    fn shifted_mean_is_close_to_zero() {
        let mut corpus = messages(&[465_346, 465_350, 465_401, 466_000, 465_999]);
        let delta = centering_delta(&corpus).unwrap();
        shift(&mut corpus, delta).unwrap();
        let sum: i64 = corpus.iter().map(|m| m.time).sum();
        let mean = sum as f64 / corpus.len() as f64;
        assert!(mean.abs() < 1.0, "mean {mean}");
    }

    #[test]
    fn overflowing_shift_leaves_times_untouched() {
        let mut corpus = messages(&[-5, 466_000]);
        assert!(matches!(
            shift(&mut corpus, i64::MAX),
            Err(ChatprepError::TimeOverflow { delta: i64::MAX })
        ));
        assert!(matches!(
            shift(&mut corpus, i64::MIN),
            Err(ChatprepError::TimeOverflow { .. })
        ));
        let times: Vec<i64> = corpus.iter().map(|m| m.time).collect();
        assert_eq!(times, vec![-5, 466_000]);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            centering_delta(&[]),
            Err(ChatprepError::EmptyCorpus { .. })
        ));
    }
}
