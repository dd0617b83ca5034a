use cfg_aliases::cfg_aliases;

fn main() {
    // The script doesn't depend on our code.
    println!("cargo:rerun-if-changed=build.rs");

    // Setup cfg aliases.
    cfg_aliases! {
        // Systems.
        free_unix: {
            all(
                unix,
                not(target_vendor = "apple"),
                not(target_os = "android"),
                not(target_os = "redox"),
                not(target_family = "wasm")
            )
        },

        // Native displays.
        x11_platform: { all(feature = "x11", free_unix) },
    }
}
