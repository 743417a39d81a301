use sporkart::{CONFIG, App, ElevationService, Track, init_with_canvas,
               open_atlas, run_cmdui};

use hoydedata::{set_map_dir, unmount_all_maps};

fn run_headless(app: &mut App) -> Result<(), String> {
    match CONFIG.command.as_str() {
        "profile" => {
            app.show_profile()?;
        }
        "" => {
            run_cmdui(app);
        },
        _ => {
            println!("Invalid command");
        },
    }

    Ok(())
}

fn main() -> Result<(), String> {
    env_logger::init();
    set_map_dir(&CONFIG.map_dir());

    let track = if CONFIG.track_fname == "" {
        Track::seed()
    }
    else {
        Track::read(&CONFIG.track_fname).map_err(|e| e.to_string())?
    };
    let track = track.shared();

    let mockup = CONFIG.mockup;
    let elevation = ElevationService::spawn(move || open_atlas(mockup));

    let res = if CONFIG.headless {
        let mut app = App::new(track, &CONFIG.track_fname, elevation,
                               CONFIG.sample_count, None);
        run_headless(&mut app)
    }
    else {
        init_with_canvas(track, elevation);
        Ok(())
    };

    unmount_all_maps();

    res
}
