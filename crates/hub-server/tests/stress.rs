// crates/hub-server/tests/stress.rs
//
// Randomized concurrent register / unregister / reconnect. After all
// tasks finish, the registry must hold exactly the identities whose last
// action left them registered.

use hub_core::{Identity, UserId};
use hub_server::config::{HubConfig, OverflowPolicy};
use hub_server::{HubHandle, Registration};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const IDENTITIES: i64 = 32;
const OPS_PER_TASK: usize = 200;

async fn churn(hub: HubHandle, user: i64, seed: u64) -> Option<i64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let identity = Identity::new(user, format!("user-{user}"));
    let mut current: Option<Registration> = None;

    for _ in 0..OPS_PER_TASK {
        match current.take() {
            None => {
                current = Some(hub.register(identity.clone()).await.unwrap());
            }
            Some(reg) => match rng.gen_range(0..3) {
                0 => {
                    hub.unregister(reg.conn_id, UserId(user)).await.unwrap();
                }
                1 => {
                    // Reconnect: the new registration replaces `reg`, whose
                    // late unregister must not remove it.
                    let replacement = hub.register(identity.clone()).await.unwrap();
                    hub.unregister(reg.conn_id, UserId(user)).await.unwrap();
                    current = Some(replacement);
                }
                _ => current = Some(reg),
            },
        }

        if rng.gen_bool(0.3) {
            tokio::task::yield_now().await;
        }
    }

    current.map(|_| user)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_churn_leaves_consistent_registry() {
    let base_seed: u64 = rand::random();
    println!("stress seed: {base_seed}");

    let config = HubConfig {
        mailbox_capacity: 16,
        overflow: OverflowPolicy::DropNewest,
        ..HubConfig::default()
    };
    let (hub, _task) = HubHandle::spawn(&config);

    let tasks: Vec<_> = (1..=IDENTITIES)
        .map(|user| tokio::spawn(churn(hub.clone(), user, base_seed.wrapping_add(user as u64))))
        .collect();

    let mut expected = Vec::new();
    for task in tasks {
        if let Some(user) = task.await.unwrap() {
            expected.push(user);
        }
    }
    expected.sort();

    let online: Vec<i64> = hub
        .online()
        .await
        .unwrap()
        .into_iter()
        .map(|identity| identity.user_id.0)
        .collect();

    assert_eq!(online, expected, "seed {base_seed}");
    assert_eq!(hub.online_count().await.unwrap(), expected.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn everyone_leaving_empties_the_registry() {
    let (hub, _task) = HubHandle::spawn(&HubConfig {
        overflow: OverflowPolicy::DropNewest,
        ..HubConfig::default()
    });

    let tasks: Vec<_> = (1..=IDENTITIES)
        .map(|user| {
            let hub = hub.clone();
            tokio::spawn(async move {
                let identity = Identity::new(user, format!("user-{user}"));
                for _ in 0..20 {
                    let reg = hub.register(identity.clone()).await.unwrap();
                    tokio::task::yield_now().await;
                    hub.unregister(reg.conn_id, UserId(user)).await.unwrap();
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(hub.online_count().await.unwrap(), 0);
}
