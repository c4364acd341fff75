use crate::config::{Command, seconds};
use anyhow::bail;
use serde_json::{Value, json};
use std::{sync::Arc, thread, time::Instant};
use trng_rpc::{CacheSpec, Client, Clock, Error, Request, Transport, extract, methods};

/// Poll interval while waiting on a cache.
const CACHE_POLL: core::time::Duration = core::time::Duration::from_millis(100);

/// Runs `command` with `client` and returns the document to print.
pub fn run<T, C>(client: &Arc<Client<T, C>>, command: &Command) -> anyhow::Result<Value>
where
    T: Transport,
    C: Clock,
{
    let request = |method: &str, params: Value| {
        Request::with_identity(method, client.identity(), params)
    };

    let output = match command {
        Command::Integers {
            n,
            min,
            max,
            unique,
            base,
        } => {
            let request = request(
                methods::GENERATE_INTEGERS,
                json!({ "n": n, "min": min, "max": max, "replacement": !unique, "base": base }),
            );
            let decimal = request.is_decimal();
            let response = client.send(request)?;
            serde_json::to_value(extract::integers(&response, decimal)?)?
        }
        Command::Decimals { n, places } => {
            let response = client.send(request(
                methods::GENERATE_DECIMAL_FRACTIONS,
                json!({ "n": n, "decimalPlaces": places }),
            ))?;
            serde_json::to_value(extract::random_data::<f64>(&response)?)?
        }
        Command::Strings {
            n,
            length,
            characters,
        } => {
            let response = client.send(request(
                methods::GENERATE_STRINGS,
                json!({ "n": n, "length": length, "characters": characters }),
            ))?;
            serde_json::to_value(extract::random_data::<String>(&response)?)?
        }
        Command::Uuids { n } => {
            let response = client.send(request(methods::GENERATE_UUIDS, json!({ "n": n })))?;
            serde_json::to_value(extract::random_data::<String>(&response)?)?
        }
        Command::Usage => json!({
            "requestsLeft": client.requests_left()?,
            "bitsLeft": client.bits_left()?,
        }),
        Command::Cache {
            n,
            min,
            max,
            capacity,
            take,
            max_wait,
        } => {
            let capacity = (*capacity).max(trng_rpc::MIN_CAPACITY);
            let batches = CacheSpec::<i64>::bulk_batches_for(capacity);
            let per_batch = *n as usize;
            let spec = CacheSpec::new(
                request(
                    methods::GENERATE_INTEGERS,
                    json!({
                        "n": per_batch * batches,
                        "min": min,
                        "max": max,
                        "replacement": true,
                        "base": 10,
                    }),
                ),
                |response, _| extract::random_data::<i64>(response),
            )
            .capacity(capacity)
            .bulk(batches, per_batch);

            let cache = client.cache(spec)?;
            let deadline = Instant::now() + seconds("max-wait", *max_wait)?;
            let mut sets = Vec::with_capacity(*take);
            while sets.len() < *take {
                match cache.get() {
                    Ok(set) => sets.push(set),
                    Err(Error::CacheEmpty) if Instant::now() < deadline => {
                        thread::sleep(CACHE_POLL);
                    }
                    Err(Error::CacheEmpty) => {
                        cache.shutdown();
                        bail!("only {} of {} sets arrived in time", sets.len(), take);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            tracing::debug!("Cache holds {} more sets", cache.len());
            cache.shutdown();
            serde_json::to_value(sets)?
        }
    };
    Ok(output)
}
