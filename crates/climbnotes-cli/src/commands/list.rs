use climbnotes_core::models::{gym_key, Attempt, DataStore, Route};

use crate::cli::ListKind;
use crate::commands::common::{
    format_attempt_lines, format_gym_lines, format_route_lines, gym_to_list_item, CliContext,
    GymListItem,
};
use crate::error::CliError;

pub async fn run_list(
    kind: ListKind,
    gym: Option<&str>,
    route: Option<&str>,
    as_json: bool,
    context: &CliContext,
) -> Result<(), CliError> {
    let data = context.open_database().await?.load_data().await?;

    let lines = match kind {
        ListKind::Gyms => {
            let items = data
                .gyms
                .iter()
                .filter(|item| gym.is_none_or(|name| item.matches(name)))
                .map(|item| gym_to_list_item(item, &data))
                .collect::<Vec<GymListItem>>();
            if as_json {
                println!("{}", serde_json::to_string_pretty(&items)?);
                return Ok(());
            }
            format_gym_lines(&items)
        }
        ListKind::Routes => {
            let routes = filter_routes(&data, gym);
            if as_json {
                println!("{}", serde_json::to_string_pretty(&routes)?);
                return Ok(());
            }
            format_route_lines(&routes)
        }
        ListKind::Attempts => {
            let attempts = filter_attempts(&data, gym, route);
            if as_json {
                println!("{}", serde_json::to_string_pretty(&attempts)?);
                return Ok(());
            }
            format_attempt_lines(&attempts)
        }
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub fn filter_routes<'a>(data: &'a DataStore, gym: Option<&str>) -> Vec<&'a Route> {
    let gym = gym.map(gym_key);
    data.routes
        .iter()
        .filter(|route| {
            gym.as_deref()
                .is_none_or(|key| gym_key(&route.gym_name) == key)
        })
        .collect()
}

/// Attempts in day order, then by index within the day
pub fn filter_attempts<'a>(
    data: &'a DataStore,
    gym: Option<&str>,
    route: Option<&str>,
) -> Vec<&'a Attempt> {
    let routes = filter_routes(data, gym);
    let mut attempts: Vec<&Attempt> = data
        .attempts
        .iter()
        .filter(|attempt| route.is_none_or(|route_id| attempt.route_id == route_id))
        .filter(|attempt| {
            routes
                .iter()
                .any(|route| route.route_id == attempt.route_id)
        })
        .collect();
    attempts.sort_by(|left, right| {
        left.climb_date
            .cmp(&right.climb_date)
            .then_with(|| left.route_id.cmp(&right.route_id))
            .then_with(|| left.attempt_index.cmp(&right.attempt_index))
    });
    attempts
}
