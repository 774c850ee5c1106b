//! Executes fetched work against resolved bridges.

use pinbridge_proto::frame::SetStatus;
use pinbridge_proto::{Action, Condition, Request, Response, Schedule};

use crate::registry::{Bridge, Registry};
use crate::Error;

/// Runs one ad-hoc request to completion and shapes its outcome for the
/// control service. A garbled reply becomes an error response; only a dead
/// device link propagates.
pub async fn perform_request(bridge: &Bridge, request: &Request) -> Result<Response, Error> {
    let response = match request.action {
        Action::Get => match bridge.get(request.pin_type, request.pin_number).await? {
            Ok(level) => Response::level(request.id, level),
            Err(e) => {
                log::warn!(
                    "pin {} on {} answered garbage: {e}",
                    request.pin_number,
                    request.port
                );
                Response::error(request.id)
            }
        },
        Action::Set => {
            let status = bridge.set(request.pin_number, request.value).await?;
            Response::set(request.id, status)
        }
    };

    Ok(response)
}

/// Applies `true_value` or `false_value` depending on the schedule's guard.
/// The set outcome does not flow into the schedule's done report; only a
/// missing device does, and that is the caller's call to make.
pub async fn perform_schedule(
    registry: &Registry,
    bridge: &Bridge,
    schedule: &Schedule,
) -> Result<(), Error> {
    let holds = conditions_hold(registry, &schedule.conditions).await?;
    let value = if holds { schedule.true_value } else { schedule.false_value };

    match bridge.set(schedule.pin_number, value).await? {
        SetStatus::Ok => {}
        SetStatus::Error => {
            log::warn!(
                "device at {} rejected scheduled set of pin {}",
                schedule.port,
                schedule.pin_number
            );
        }
    }

    Ok(())
}

/// Sequential guard evaluation; the first failing clause wins and an empty
/// guard holds. Clauses may probe devices other than the schedule's own,
/// so each one resolves its port independently. An unresolvable or
/// unreadable probe counts as a failed clause.
pub async fn conditions_hold(registry: &Registry, conditions: &[Condition]) -> Result<bool, Error> {
    for condition in conditions {
        let bridge = match registry.device_at(&condition.port) {
            Some(bridge) => bridge,
            None => return Ok(false),
        };

        let level = match bridge.get(condition.pin_type, condition.pin_number).await? {
            Ok(level) => level,
            Err(e) => {
                log::warn!(
                    "condition probe of pin {} on {} answered garbage: {e}",
                    condition.pin_number,
                    condition.port
                );
                return Ok(false);
            }
        };

        // Comparisons are inclusive at the boundary: `>` holds when the
        // reading equals the threshold. Unknown signs never fail.
        let fails = match condition.sign {
            '>' => level < condition.raw_value,
            '<' => level > condition.raw_value,
            '=' => level != condition.raw_value,
            _ => false,
        };

        if fails {
            return Ok(false);
        }
    }

    Ok(true)
}
