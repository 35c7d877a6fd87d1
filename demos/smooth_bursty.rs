use rand::Rng;
use smooth_bursty::RateLimiter;
use std::{
    thread,
    time::{Duration, Instant},
};

fn main() {
    // Allow 4 permits per second on average and bank up to 2 seconds worth of them
    let limiter = smooth_bursty::smooth_bursty(2);
    limiter.set_rate(4);

    let start = Instant::now();
    println!("Acquiring 20 permits, the first ones come out of the burst");
    for i in 0..20 {
        limiter.acquire_one();
        println!("permit {i:2} at {:?}", start.elapsed());
    }

    let start = Instant::now();
    let mut pass = 0;
    let mut rng = rand::thread_rng();

    println!("Probing for 5 seconds with varying intervals");
    while start.elapsed() < Duration::from_secs(5) {
        if limiter.try_acquire_one() == 0 {
            pass += 1
        }
        thread::sleep(Duration::from_micros(rng.gen_range(0..10_000)));
    }

    // Resulting rate should be close to 4/s, all banked permits were spent above.
    let elapsed = start.elapsed().as_secs_f64();
    let rate_per_s = pass as f64 / elapsed;
    println!("Average pass rate {rate_per_s}");
}
