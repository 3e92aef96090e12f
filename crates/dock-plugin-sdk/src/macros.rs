//! Export macro.

/// Export the library factory symbol, mapping entry class names to plugin
/// constructors.
///
/// Each constructor expression is evaluated once per created instance.
/// Unknown entry classes yield a null instance, which the host reports as
/// a load failure.
#[macro_export]
macro_rules! export_plugin {
    ($($class:literal => $ctor:expr),+ $(,)?) => {
        /// Plugin factory called by the dock host.
        ///
        /// # Safety
        ///
        /// `entry_class` must be null or a valid NUL-terminated string.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn dock_plugin_create(
            entry_class: *const ::std::os::raw::c_char,
            host: $crate::abi::FfiHostApi,
        ) -> $crate::abi::FfiPluginHandle {
            let constructors: &[(&str, $crate::shim::PluginConstructor)] = &[
                $((
                    $class,
                    (|| -> ::std::boxed::Box<dyn $crate::prelude::DockPlugin> {
                        ::std::boxed::Box::new($ctor)
                    }) as $crate::shim::PluginConstructor,
                )),+
            ];
            unsafe { $crate::shim::create_plugin(entry_class, host, constructors) }
        }
    };
}
